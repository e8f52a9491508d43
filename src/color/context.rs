use crate::color::model::{ColorModel, Polarity};
use crate::foundation::error::{LaminaError, LaminaResult};

/// The device-facing color configuration active at one nesting level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorInfo {
    pub model: ColorModel,
    pub polarity: Polarity,
    pub n_comps: u8,
    pub depth: u32,
}

impl ColorInfo {
    pub fn of(model: ColorModel) -> Self {
        Self {
            model,
            polarity: model.polarity(),
            n_comps: model.n_colorants() as u8,
            depth: model.depth(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Saved {
    info: ColorInfo,
    changed: bool,
}

/// Stack of saved color configurations, one entry per open group or mask.
///
/// Every group/mask begin pushes an entry (flagged `changed` only when the model actually
/// switched) so that pushes and pops always pair up.
#[derive(Clone, Debug)]
pub struct ColorModelContext {
    current: ColorInfo,
    saved: Vec<Saved>,
}

impl ColorModelContext {
    pub fn new(model: ColorModel) -> Self {
        Self {
            current: ColorInfo::of(model),
            saved: Vec::new(),
        }
    }

    pub fn current(&self) -> ColorInfo {
        self.current
    }

    pub fn model(&self) -> ColorModel {
        self.current.model
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Saves the current configuration and activates `model`. Returns whether it changed.
    pub fn push(&mut self, model: ColorModel) -> bool {
        let changed = model != self.current.model;
        self.saved.push(Saved {
            info: self.current,
            changed,
        });
        if changed {
            self.current = ColorInfo::of(model);
        }
        changed
    }

    /// Restores the configuration saved by the matching `push`.
    pub fn pop(&mut self) -> LaminaResult<ColorInfo> {
        let saved = self
            .saved
            .pop()
            .ok_or_else(|| LaminaError::invalid_state("color model context underflow"))?;
        if saved.changed {
            self.current = saved.info;
        }
        Ok(self.current)
    }

    pub fn ensure_balanced(&self) -> LaminaResult<()> {
        if self.saved.is_empty() {
            Ok(())
        } else {
            Err(LaminaError::invalid_state(format!(
                "{} color model context entries left open",
                self.saved.len()
            )))
        }
    }

    /// Drops every saved entry and reinstates `model`.
    pub fn reset(&mut self, model: ColorModel) {
        self.saved.clear();
        self.current = ColorInfo::of(model);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/color/context.rs"]
mod tests;
