// Single-character fullness indicators for the record buffer.
const EMPTY_BUFFER_STATE: &str = "○";
const FILL_BUFFER_STATES: [&str; 4] = ["◔", "◑", "◕", "●"];

/// Render the buffer gauge shown between the read and write rates,
/// e.g. "⇨ ◑ ⇨". The empty marker is reserved for a fill of exactly zero.
pub fn buffer_status(fill: usize, capacity: usize) -> String {
    let mut state = EMPTY_BUFFER_STATE;

    if fill > 0 && capacity > 0 {
        let fill = fill.min(capacity);
        let fill_percentage = fill as f64 / capacity as f64;
        let selection =
            (fill_percentage * FILL_BUFFER_STATES.len() as f64).ceil() as usize - 1;
        state = FILL_BUFFER_STATES[selection.min(FILL_BUFFER_STATES.len() - 1)];
    }

    format!("⇨ {state} ⇨")
}
