use std::io::Write;
use viewer_connection::ViewerHandle;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Redraw the terminal every time the display lines change.
pub async fn run(mut handle: ViewerHandle) {
    while handle.changed().await {
        let frame = render(&handle.snapshot());
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(frame.as_bytes()).and_then(|()| out.flush()) {
            tracing::warn!("Cannot draw view: {e}");
        }
    }
}

/// One full screen: clear, then each line as-is, oldest at the top.
fn render(lines: &[String]) -> String {
    let mut frame = String::from(CLEAR_SCREEN);
    for line in lines {
        frame.push_str(line);
        frame.push('\n');
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_drawn_unchanged_in_order() {
        let frame = render(&["first".to_string(), "second".to_string()]);
        assert_eq!(frame, format!("{CLEAR_SCREEN}first\nsecond\n"));
    }
}
