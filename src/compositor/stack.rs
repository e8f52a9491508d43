use serde::{Deserialize, Serialize};

use crate::blend::{BlendMode, MaskSubtype, TransferFn};
use crate::color::ColorModel;
use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};

use super::buffer::{MaskInfo, PendingMask, PlaneBuffer};
use super::compose::{collapse_mask, compose_group, convert_planes, preserve_backdrop};

/// Limits for one compositor instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositorOpts {
    /// Upper bound on bytes held by all plane buffers of one stack; `None` is unbounded.
    pub max_buffer_bytes: Option<usize>,
}

/// Device-space request for a new group level.
#[derive(Clone, Debug)]
pub struct PushGroup {
    pub rect: IntRect,
    pub isolated: bool,
    pub knockout: bool,
    pub alpha: u8,
    pub shape: u8,
    pub blend_mode: BlendMode,
    pub mask_id: u32,
    pub model: ColorModel,
    pub idle: bool,
}

/// Device-space request for a new soft-mask level.
#[derive(Clone, Debug)]
pub struct PushMask {
    pub rect: IntRect,
    pub bg_alpha: u8,
    pub transfer_fn: TransferFn,
    pub mask_id: u32,
    pub subtype: MaskSubtype,
    pub is_cie: bool,
    pub replacing: bool,
    pub model: ColorModel,
    pub idle: bool,
}

#[derive(Debug)]
struct Slot {
    buf: PlaneBuffer,
    parent: Option<usize>,
}

/// Arena of nested group and mask buffers plus the single pending-mask slot.
///
/// Slot 0 is the page (or band) backdrop and is never isolated or knockout. Masks move
/// between the pending slot, a group's mask slot and a mask's saved slot; nothing is shared.
#[derive(Debug)]
pub struct CompositingStack {
    rect: IntRect,
    slots: Vec<Slot>,
    pending: PendingMask,
    opts: CompositorOpts,
}

impl CompositingStack {
    pub fn new(rect: IntRect, model: ColorModel, opts: CompositorOpts) -> LaminaResult<Self> {
        model.validate()?;
        let n_chan = model.n_colorants() + 1;
        check_budget(&opts, 0, PlaneBuffer::projected_len(rect, n_chan))?;
        let base = PlaneBuffer::new(rect, model, n_chan, false, false, false)?;
        Ok(Self {
            rect,
            slots: vec![Slot {
                buf: base,
                parent: None,
            }],
            pending: PendingMask::None,
            opts,
        })
    }

    pub fn rect(&self) -> IntRect {
        self.rect
    }

    /// Number of buffers on the stack, including the base.
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn base(&self) -> &PlaneBuffer {
        &self.slots[0].buf
    }

    pub fn top(&self) -> &PlaneBuffer {
        &self.slots[self.slots.len() - 1].buf
    }

    pub fn top_mut(&mut self) -> &mut PlaneBuffer {
        let i = self.slots.len() - 1;
        &mut self.slots[i].buf
    }

    pub fn pending_mask(&self) -> &PendingMask {
        &self.pending
    }

    /// Bytes currently held by stack buffers and every reachable mask.
    pub fn live_bytes(&self) -> usize {
        fn mask_bytes(m: &PendingMask) -> usize {
            match m {
                PendingMask::None => 0,
                PendingMask::Ready(b) => b.byte_len() + mask_bytes(&b.mask),
                PendingMask::Vacant(_, saved) => mask_bytes(saved),
            }
        }
        self.slots
            .iter()
            .map(|s| s.buf.byte_len() + mask_bytes(&s.buf.mask))
            .sum::<usize>()
            + mask_bytes(&self.pending)
    }

    #[tracing::instrument(level = "trace", skip(self), fields(depth = self.slots.len()))]
    pub fn push_group(&mut self, req: &PushGroup) -> LaminaResult<()> {
        // Knockout groups are always isolated.
        let isolated = req.isolated || req.knockout;
        let parent = self.slots.len() - 1;
        let tos = &self.slots[parent].buf;
        let has_shape = tos.has_shape || tos.knockout;
        let has_alpha_g = !isolated;
        let n_chan = req.model.validate()?.n_colorants() + 1;
        let rect = req.rect.intersect(&self.rect).normalized();
        let planes = n_chan + usize::from(has_shape) + usize::from(has_alpha_g);
        check_budget(
            &self.opts,
            self.live_bytes(),
            PlaneBuffer::projected_len(rect, planes),
        )?;

        let mut buf = PlaneBuffer::new(rect, req.model, n_chan, has_alpha_g, has_shape, req.idle)?;
        buf.isolated = isolated;
        buf.knockout = req.knockout;
        buf.alpha = req.alpha;
        buf.shape = req.shape;
        buf.blend_mode = req.blend_mode;
        buf.mask_id = req.mask_id;
        buf.mask = std::mem::take(&mut self.pending);
        if let PendingMask::Vacant(id, _) = &buf.mask {
            buf.masked_out = *id == req.mask_id;
        }
        if !isolated {
            preserve_backdrop(&mut buf, &self.slots[parent].buf);
        }
        self.slots.push(Slot {
            buf,
            parent: Some(parent),
        });
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self), fields(depth = self.slots.len()))]
    pub fn pop_group(&mut self) -> LaminaResult<()> {
        if self.slots.len() < 2 {
            return Err(LaminaError::invalid_state("pop_group with no parent buffer"));
        }
        let Some(Slot { buf: mut tos, parent }) = self.slots.pop() else {
            return Err(LaminaError::invalid_state("compositing stack is empty"));
        };
        let parent = parent.ok_or_else(|| LaminaError::invalid_state("group without parent"))?;
        if tos.mask_info.is_some() {
            return Err(LaminaError::invalid_state("pop_group while a mask is open"));
        }

        // A mask pushed inside the group and never consumed is dropped here.
        self.pending = PendingMask::None;
        let (mask, restored) = match std::mem::take(&mut tos.mask) {
            PendingMask::Ready(mut m) if m.mask_id == tos.mask_id => {
                let restored = std::mem::take(&mut m.mask);
                (Some(m), restored)
            }
            PendingMask::Vacant(id, saved) if id == tos.mask_id => (None, *saved),
            // A stale mask: its group was skipped (e.g. outside this band).
            _ => (None, PendingMask::None),
        };

        let visible = !tos.idle
            && !tos.masked_out
            && mask.as_ref().is_none_or(|m| m.has_data());
        if visible {
            let nos = &mut self.slots[parent].buf;
            let mut r = tos.rect.intersect(&nos.rect);
            if let Some(m) = &mask {
                r = r.intersect(&m.rect);
            }
            if !r.is_empty() {
                if tos.model != nos.model {
                    convert_planes(&mut tos, nos.model)?;
                }
                compose_group(&tos, nos, mask.as_deref(), r);
            }
        }
        self.pending = restored;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self), fields(depth = self.slots.len()))]
    pub fn push_mask(&mut self, req: &PushMask) -> LaminaResult<()> {
        if req.replacing {
            self.pending = PendingMask::None;
        }
        let n_chan = req.model.validate()?.n_colorants() + 1;
        let rect = req.rect.intersect(&self.rect).normalized();
        check_budget(
            &self.opts,
            self.live_bytes(),
            PlaneBuffer::projected_len(rect, n_chan),
        )?;
        let mut buf = PlaneBuffer::new(rect, req.model, n_chan, false, false, req.idle)?;
        buf.alpha = req.bg_alpha;
        buf.isolated = true;
        buf.mask_id = req.mask_id;
        buf.mask_info = Some(MaskInfo {
            subtype: req.subtype,
            is_cie: req.is_cie,
            transfer_fn: req.transfer_fn.clone(),
            bg_alpha: req.bg_alpha,
        });
        buf.mask = std::mem::take(&mut self.pending);
        let parent = self.slots.len() - 1;
        self.slots.push(Slot {
            buf,
            parent: Some(parent),
        });
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self), fields(depth = self.slots.len()))]
    pub fn pop_mask(&mut self) -> LaminaResult<()> {
        if self.slots.len() < 2 {
            return Err(LaminaError::invalid_state("pop_mask with no parent buffer"));
        }
        let Some(Slot { buf: mut tos, .. }) = self.slots.pop() else {
            return Err(LaminaError::invalid_state("compositing stack is empty"));
        };
        if tos.mask_info.is_none() {
            return Err(LaminaError::invalid_state("pop_mask on a group buffer"));
        }
        self.pending = if tos.has_data() {
            collapse_mask(&mut tos)?;
            PendingMask::Ready(Box::new(tos))
        } else {
            let saved = std::mem::take(&mut tos.mask);
            PendingMask::Vacant(tos.mask_id, Box::new(saved))
        };
        Ok(())
    }

    /// Consumes the stack, returning the base buffer. Fails if groups or masks are still open.
    pub fn into_base(mut self) -> LaminaResult<PlaneBuffer> {
        if self.slots.len() != 1 {
            return Err(LaminaError::invalid_state(format!(
                "{} group/mask levels still open",
                self.slots.len() - 1
            )));
        }
        self.slots
            .pop()
            .map(|s| s.buf)
            .ok_or_else(|| LaminaError::invalid_state("compositing stack is empty"))
    }
}

fn check_budget(opts: &CompositorOpts, live: usize, extra: usize) -> LaminaResult<()> {
    match opts.max_buffer_bytes {
        Some(max) if live.saturating_add(extra) > max => Err(LaminaError::out_of_memory(format!(
            "plane buffers need {} bytes, budget is {max}",
            live.saturating_add(extra)
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/stack.rs"]
mod tests;
