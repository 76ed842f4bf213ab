//! Watch face layout.
//!
//! The renderer turns one state sample into an ordered list of draw commands.
//! It never touches pixels: surfaces decide how text, icons and fills become
//! an image. Output depends only on the inputs, so two calls with the same
//! state produce the same commands.

use serde::Serialize;

use crate::{
    clock::ClockState,
    config::{Color, LayoutConfig},
    display_mode::FaceMode,
    weather::{WeatherIcon, WeatherSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width() / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextStyle {
    pub color: Color,
    pub size: f32,
    #[serde(rename = "antiAlias")]
    pub anti_alias: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear {
        color: Color,
    },
    FillRect {
        rect: Rect,
        color: Color,
    },
    /// `x` is the left edge of the text run, `y` its baseline.
    Text {
        text: String,
        x: f32,
        y: f32,
        style: TextStyle,
    },
    Icon {
        icon: WeatherIcon,
        x: f32,
        y: f32,
        size: u32,
    },
}

pub trait TextMeasure {
    fn measure(&self, text: &str, style: &TextStyle) -> f32;
}

/// Fixed advance per character, proportional to the text size.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasure {
    pub advance_ratio: f32,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self { advance_ratio: 0.6 }
    }
}

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        text.chars().count() as f32 * style.size * self.advance_ratio
    }
}

pub trait DrawSurface {
    fn draw(&mut self, command: &DrawCommand);

    fn present(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            self.draw(command);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaceRenderer {
    layout: LayoutConfig,
    round: bool,
}

impl FaceRenderer {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            round: false,
        }
    }

    pub fn is_round(&self) -> bool {
        self.round
    }

    /// Round screens use the larger text sizes.
    pub fn set_round(&mut self, round: bool) -> bool {
        if self.round == round {
            return false;
        }
        self.round = round;
        true
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.layout.width, self.layout.height)
    }

    pub fn render(
        &self,
        clock: &ClockState,
        weather: &WeatherSnapshot,
        mode: FaceMode,
        measure: &impl TextMeasure,
    ) -> Vec<DrawCommand> {
        let layout = &self.layout;
        let bounds = self.bounds();
        let center_x = bounds.center_x();
        let y = layout.y_offset;
        let line = layout.line_height;

        let (title_size, date_size) = if self.round {
            (layout.text_size_round, layout.date_size_round)
        } else {
            (layout.text_size, layout.date_size)
        };
        let title = TextStyle {
            color: layout.primary_text,
            size: title_size,
            anti_alias: mode.anti_alias(),
        };
        let secondary = TextStyle {
            color: layout.secondary_text,
            size: date_size,
            anti_alias: true,
        };
        let primary_small = TextStyle {
            color: layout.primary_text,
            ..secondary
        };

        let mut commands = Vec::with_capacity(6);

        if mode.ambient {
            commands.push(DrawCommand::Clear {
                color: Color::BLACK,
            });
        } else {
            commands.push(DrawCommand::FillRect {
                rect: bounds,
                color: layout.background,
            });
        }

        let time = clock.time_text();
        let time_width = measure.measure(&time, &title);
        commands.push(DrawCommand::Text {
            x: center_x - time_width / 2.0,
            y,
            text: time,
            style: title,
        });

        let date = clock.date_text();
        let date_half = measure.measure(&date, &secondary) / 2.0;
        commands.push(DrawCommand::Text {
            x: center_x - date_half,
            y: y + line,
            text: date,
            style: secondary,
        });

        if mode.ambient {
            return commands;
        }

        // Weather row hangs off the date line: icon on its left edge, low
        // temperature flush with its right edge.
        commands.push(DrawCommand::Icon {
            icon: weather.icon(),
            x: center_x - date_half,
            y: y + 1.5 * line,
            size: layout.icon_size,
        });

        let high_width = measure.measure(&weather.high_temp, &secondary);
        commands.push(DrawCommand::Text {
            text: weather.high_temp.clone(),
            x: center_x - high_width / 2.0,
            y: y + 2.5 * line,
            style: primary_small,
        });

        let low_width = measure.measure(&weather.low_temp, &secondary);
        commands.push(DrawCommand::Text {
            text: weather.low_temp.clone(),
            x: center_x + date_half - low_width,
            y: y + 2.5 * line,
            style: secondary,
        });

        commands
    }
}
