use serde::Serialize;

/// Mode handed to the renderer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceMode {
    pub active: bool,
    pub ambient: bool,
    #[serde(rename = "lowBitAmbient")]
    pub low_bit_ambient: bool,
}

impl FaceMode {
    pub const INTERACTIVE: FaceMode = FaceMode {
        active: true,
        ambient: false,
        low_bit_ambient: false,
    };

    /// Low-bit panels cannot show anti-aliased glyphs in ambient.
    pub fn anti_alias(self) -> bool {
        !(self.low_bit_ambient && self.ambient)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisplayModeController {
    visible: bool,
    ambient: bool,
    low_bit_ambient: Option<bool>,
}

impl DisplayModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_ambient(&self) -> bool {
        self.ambient
    }

    pub fn is_low_bit_ambient(&self) -> bool {
        self.low_bit_ambient.unwrap_or(false)
    }

    pub fn set_visible(&mut self, visible: bool) -> bool {
        if self.visible != visible {
            self.visible = visible;
            true
        } else {
            false
        }
    }

    pub fn set_ambient(&mut self, ambient: bool) -> bool {
        if self.ambient != ambient {
            self.ambient = ambient;
            true
        } else {
            false
        }
    }

    /// The capability is learned once; later reports are ignored.
    pub fn set_low_bit_ambient(&mut self, low_bit_ambient: bool) -> bool {
        if self.low_bit_ambient.is_some() {
            return false;
        }
        self.low_bit_ambient = Some(low_bit_ambient);
        low_bit_ambient
    }

    /// Interactive ticks only run while shown and not in ambient; ambient
    /// redraws ride on the OS minute tick.
    pub fn is_active_for_timer(&self) -> bool {
        self.visible && !self.ambient
    }

    pub fn mode(&self) -> FaceMode {
        FaceMode {
            active: self.is_active_for_timer(),
            ambient: self.ambient,
            low_bit_ambient: self.is_low_bit_ambient(),
        }
    }
}
