//! Buffer-level operations run at push and pop time: backdrop copy, group compositing,
//! color layout conversion and mask collapse.

use crate::blend::{
    MAX_CHANNELS, composite_group, knockout_isolated, recomposite_group, smask::collapse_pixel,
};
use crate::color::ColorModel;
use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::{mul8, union8};

use super::buffer::PlaneBuffer;

/// Copies `tos`'s color, alpha and (when both track it) shape planes into the freshly
/// allocated `buf` over their common rectangle.
pub(crate) fn preserve_backdrop(buf: &mut PlaneBuffer, tos: &PlaneBuffer) {
    let r = buf.rect.intersect(&tos.rect);
    if r.is_empty() {
        return;
    }
    let (Some(src), Some(_)) = (tos.data.as_ref(), buf.data.as_ref()) else {
        return;
    };
    let mut planes: Vec<(usize, usize)> = (0..buf.n_chan.min(tos.n_chan)).map(|p| (p, p)).collect();
    if let (Some(dp), Some(sp)) = (buf.shape_plane(), tos.shape_plane()) {
        planes.push((dp, sp));
    }
    let width = r.width() as usize;
    let (bstride, tstride) = (buf.planestride, tos.planestride);
    let offsets: Vec<(usize, usize)> = (r.y0..r.y1)
        .map(|y| (buf.offset(r.x0, y), tos.offset(r.x0, y)))
        .collect();
    let Some(dst) = buf.data.as_mut() else {
        return;
    };
    for (dp, sp) in planes {
        for &(bo, to) in &offsets {
            let d = dp * bstride + bo;
            let s = sp * tstride + to;
            dst[d..d + width].copy_from_slice(&src[s..s + width]);
        }
    }
}

/// Composites the popped group `tos` onto its parent `nos` within `r`, gated by `mask`.
///
/// Both buffers must already share a color layout.
pub(crate) fn compose_group(
    tos: &PlaneBuffer,
    nos: &mut PlaneBuffer,
    mask: Option<&PlaneBuffer>,
    r: IntRect,
) {
    let r = r.intersect(&tos.bbox);
    if r.is_empty() {
        return;
    }
    let Some(tdata) = tos.data.as_ref() else {
        return;
    };
    let n = nos.n_colorants();
    let model = nos.model;
    let additive = model.is_additive();
    let (ts, ns) = (tos.planestride, nos.planestride);
    let tos_shape = tos.shape_plane();
    let tos_alpha_g = tos.alpha_g_plane();
    let nos_shape = nos.shape_plane();
    let nos_alpha_g = nos.alpha_g_plane();
    let nos_knockout = nos.knockout;
    let (nos_rect, nos_rowstride) = (nos.rect, nos.rowstride);
    let Some(ndata) = nos.data.as_mut() else {
        return;
    };

    let mut tp = [0u8; MAX_CHANNELS];
    let mut np = [0u8; MAX_CHANNELS];
    for y in r.y0..r.y1 {
        for x in r.x0..r.x1 {
            let to = tos.offset(x, y);
            let no = (y - nos_rect.y0) as usize * nos_rowstride + (x - nos_rect.x0) as usize;
            let mut pix_alpha = tos.alpha;
            if let Some(m) = mask {
                pix_alpha = mul8(pix_alpha, m.get(0, x, y));
            }
            for i in 0..n {
                let (tv, nv) = (tdata[i * ts + to], ndata[i * ns + no]);
                tp[i] = if additive { tv } else { 255 - tv };
                np[i] = if additive { nv } else { 255 - nv };
            }
            tp[n] = tdata[n * ts + to];
            np[n] = ndata[n * ns + no];

            if nos_knockout {
                let shape = tos_shape.map_or(tp[n], |p| tdata[p * ts + to]);
                let mut s = nos_shape.map(|p| ndata[p * ns + no]);
                knockout_isolated(&mut np, s.as_mut(), &tp, n, shape, pix_alpha);
                if let (Some(p), Some(s)) = (nos_shape, s) {
                    ndata[p * ns + no] = s;
                }
            } else {
                let mut g = nos_alpha_g.map(|p| ndata[p * ns + no]);
                if tos.isolated {
                    composite_group(&mut np, g.as_mut(), &tp, n, pix_alpha, tos.blend_mode, model);
                } else {
                    let src_alpha_g = tos_alpha_g.map_or(tp[n], |p| tdata[p * ts + to]);
                    recomposite_group(
                        &mut np,
                        g.as_mut(),
                        &tp,
                        src_alpha_g,
                        n,
                        pix_alpha,
                        tos.blend_mode,
                        model,
                    );
                }
                if let (Some(p), Some(g)) = (nos_alpha_g, g) {
                    ndata[p * ns + no] = g;
                }
                if let Some(p) = nos_shape {
                    let src_shape = tos_shape.map_or(255, |sp| tdata[sp * ts + to]);
                    ndata[p * ns + no] = union8(ndata[p * ns + no], mul8(src_shape, tos.shape));
                }
            }

            for i in 0..n {
                ndata[i * ns + no] = if additive { np[i] } else { 255 - np[i] };
            }
            ndata[n * ns + no] = np[n];
        }
    }
    nos.grow_bbox(&r);
}

/// Re-lays `buf`'s colorant planes out for `target`.
///
/// Colorants are copied plane by plane (complemented when polarity differs, a single gray
/// plane replicated across the first three), missing colorants take the target's paper
/// value, and alpha/shape/group-alpha planes are carried over unchanged.
pub(crate) fn convert_planes(buf: &mut PlaneBuffer, target: ColorModel) -> LaminaResult<()> {
    let src_n = buf.n_colorants();
    let dst_n = target.n_colorants();
    let extra = buf.n_planes - src_n;
    let stride = buf.planestride;
    let flip = buf.model.polarity() != target.polarity();
    let paper = if target.is_additive() { 255 } else { 0 };

    if let Some(src) = buf.data.as_ref() {
        let len = stride * (dst_n + extra);
        let mut dst = Vec::new();
        dst.try_reserve_exact(len)
            .map_err(|_| LaminaError::out_of_memory(format!("color conversion of {len} bytes")))?;
        dst.resize(len, 0);
        for i in 0..dst_n {
            let from = if src_n == 1 && i < 3 {
                Some(0)
            } else {
                (i < src_n).then_some(i)
            };
            let out = &mut dst[i * stride..(i + 1) * stride];
            match from {
                Some(p) => {
                    let inp = &src[p * stride..(p + 1) * stride];
                    for (o, &v) in out.iter_mut().zip(inp) {
                        *o = if flip { 255 - v } else { v };
                    }
                }
                None => out.fill(paper),
            }
        }
        dst[dst_n * stride..].copy_from_slice(&src[src_n * stride..(src_n + extra) * stride]);
        buf.data = Some(dst);
    }
    buf.model = target;
    buf.n_chan = dst_n + 1;
    buf.n_planes = dst_n + extra;
    Ok(())
}

/// Reduces a popped mask buffer to one coverage plane with the transfer function applied.
pub(crate) fn collapse_mask(buf: &mut PlaneBuffer) -> LaminaResult<()> {
    let Some(info) = buf.mask_info.clone() else {
        return Err(LaminaError::invalid_state("collapsing a buffer that is not a mask"));
    };
    let n = buf.n_colorants();
    let stride = buf.planestride;
    if let Some(src) = buf.data.as_ref() {
        let mut out = Vec::new();
        out.try_reserve_exact(stride)
            .map_err(|_| LaminaError::out_of_memory("mask plane"))?;
        out.resize(stride, 0);
        let mut colors = [0u8; MAX_CHANNELS];
        for (i, o) in out.iter_mut().enumerate() {
            for (c, v) in colors.iter_mut().take(n).enumerate() {
                *v = src[c * stride + i];
            }
            let alpha = src[n * stride + i];
            let v = collapse_pixel(
                buf.model,
                info.subtype,
                info.is_cie,
                &colors[..n],
                alpha,
                info.bg_alpha,
            );
            *o = info.transfer_fn.apply(v);
        }
        buf.data = Some(out);
    }
    buf.n_chan = 1;
    buf.n_planes = 1;
    buf.has_shape = false;
    buf.has_alpha_g = false;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/compose.rs"]
mod tests;
