use crate::Result;
use crate::callbacks::Callback;
use crate::llm::Message;
use async_trait::async_trait;
use std::io::Write;

/// Writes a markdown transcript of the agent run, one section per step.
pub struct MessageLogger<W: Write + Send> {
    displayed: usize,
    writer: W,
    step: u32,
}

impl<W: Write + Send> MessageLogger<W> {
    pub fn new(name: &str, mut writer: W) -> Result<Box<Self>> {
        write!(writer, "## {}\n\n", name)?;

        Ok(Box::new(Self {
            displayed: 0,
            writer,
            step: 0,
        }))
    }

    fn display_messages(&mut self, messages: &[Message]) -> Result<()> {
        writeln!(self.writer, "### Step {}\n", self.step)?;

        messages
            .iter()
            .try_for_each(|m| write!(self.writer, "{}", m))?;

        writeln!(self.writer, "---")?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> Callback for MessageLogger<W> {
    async fn call(&mut self, messages: Vec<Message>) -> Result<Vec<Message>> {
        // history only grows during a run; restart if a new run reuses the logger
        if messages.len() < self.displayed {
            self.displayed = 0;
        }

        self.display_messages(&messages[self.displayed..])?;
        self.writer.flush()?;

        self.step += 1;
        self.displayed = messages.len();

        Ok(messages)
    }
}
