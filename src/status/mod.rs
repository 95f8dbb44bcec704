mod buffer;
mod set;

pub use buffer::buffer_status;
pub use set::Set;

const PLACEHOLDER: &str = "  --  ";

/// One operation's row in the status display.
#[derive(Debug, Clone)]
pub struct Status {
    output_table: String,

    pub description: String,
    pub backfill: String,
    pub stream: String,
    pub rate: String,
}

impl Status {
    pub fn new<T: Into<String>>(output_table: T) -> Self {
        Self {
            output_table: output_table.into(),
            description: PLACEHOLDER.into(),
            backfill: PLACEHOLDER.into(),
            stream: PLACEHOLDER.into(),
            rate: String::new(),
        }
    }

    pub fn display(&self) -> Vec<String> {
        vec![
            format!("⇨ [{}]", self.output_table),
            self.description.clone(),
            self.backfill.clone(),
            self.stream.clone(),
            self.rate.clone(),
        ]
    }

    pub fn set_waiting(&mut self) {
        self.description = "Waiting...".into();
    }

    pub fn set_noop(&mut self) {
        self.description = "Nothing to do".into();
    }

    pub fn set_error(&mut self) {
        self.description = "Error!".into();
    }
}
