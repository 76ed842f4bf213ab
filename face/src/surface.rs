use tracing::{debug, trace};
use weatherface_common::{render::DrawCommand, DrawSurface};

/// Keeps the most recent frame so it can be inspected over HTTP.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pending: Vec<DrawCommand>,
    last_frame: Vec<DrawCommand>,
    frames: u64,
}

impl RecordingSurface {
    pub fn last_frame(&self) -> &[DrawCommand] {
        &self.last_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl DrawSurface for RecordingSurface {
    fn draw(&mut self, command: &DrawCommand) {
        trace!("draw {command:?}");
        self.pending.push(command.clone());
    }

    fn present(&mut self, commands: &[DrawCommand]) {
        self.pending.clear();
        for command in commands {
            self.draw(command);
        }
        self.last_frame = std::mem::take(&mut self.pending);
        self.frames = self.frames.saturating_add(1);

        let texts: Vec<&str> = self
            .last_frame
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        debug!("frame {} presented: {}", self.frames, texts.join(" | "));
    }
}
