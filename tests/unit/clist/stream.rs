use super::*;

fn layout(n_bands: u32) -> BandLayout {
    BandLayout {
        band_height: 10,
        n_bands,
        page_height: n_bands * 10,
        tile_cache_bytes: 4096,
        tile_max_count: 25,
        tile_hash_mask: 0xff,
        command_buffer_bytes: 1 << 16,
        scratch_row_bytes: 40,
    }
}

fn log_with(entries: &[IndexEntry], content: Vec<u8>, complete: bool) -> PageLog {
    let mut e = Encoder::new(ByteOrder::Little);
    for entry in entries {
        entry.encode(&mut e);
    }
    PageLog {
        rect: IntRect::new(0, 0, 10, 30),
        model: ColorModel::Rgb,
        layout: layout(3),
        byte_order: ByteOrder::Little,
        content,
        index: e.into_bytes(),
        bands: vec![BandState::default(); 3],
        complete,
        charge: None,
    }
}

#[test]
fn charges_are_released_on_drop() {
    let pool = MemoryPool::new(Some(100));
    let a = pool.try_charge(60).unwrap();
    assert_eq!(pool.used(), 60);
    let err = pool.try_charge(41).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(pool.used(), 60);
    drop(a);
    assert_eq!(pool.used(), 0);
    assert!(pool.try_charge(100).is_ok());
}

#[test]
fn absorbed_charge_is_released_once() {
    let pool = MemoryPool::default();
    let mut a = pool.try_charge(10).unwrap();
    a.absorb(pool.try_charge(5).unwrap());
    assert_eq!(a.bytes(), 15);
    assert_eq!(pool.used(), 15);
    drop(a);
    assert_eq!(pool.used(), 0);
}

#[test]
fn index_decodes_with_sentinel() {
    let entries = [
        IndexEntry {
            band_min: 0,
            band_max: 2,
            offset: 0,
        },
        IndexEntry {
            band_min: 1,
            band_max: 1,
            offset: 1,
        },
        IndexEntry::sentinel(2),
    ];
    let log = log_with(&entries, vec![Opcode::EndRun as u8, Opcode::EndRun as u8, 0xff], true);
    let decoded = log.entries().unwrap();
    assert_eq!(decoded, entries);
    assert!(decoded[0].covers(2));
    assert!(!decoded[1].covers(0));
    assert!(!decoded[2].covers(0));
}

#[test]
fn missing_sentinel_is_rejected() {
    let entries = [IndexEntry {
        band_min: 0,
        band_max: 0,
        offset: 0,
    }];
    let log = log_with(&entries, vec![Opcode::EndRun as u8], false);
    assert!(matches!(log.entries(), Err(LaminaError::Range(_))));
}

#[test]
fn complete_log_must_end_with_end_page() {
    let log = log_with(&[IndexEntry::sentinel(0)], vec![Opcode::EndRun as u8], true);
    assert!(log.entries().is_err());
    let partial = log_with(&[IndexEntry::sentinel(0)], Vec::new(), false);
    assert_eq!(partial.entries().unwrap().len(), 1);
}

#[test]
fn out_of_range_band_is_rejected() {
    let entries = [
        IndexEntry {
            band_min: 0,
            band_max: 3,
            offset: 0,
        },
        IndexEntry::sentinel(0),
    ];
    let log = log_with(&entries, Vec::new(), false);
    assert!(log.entries().is_err());
}
