//! Useful common code

use std::io::Write as _;

use color_eyre::eyre::Result;

/// Reset the user's terminal with a clean slate.
pub const RESET_SCREEN: &str = "\x1bc";

/// Ask the terminal to report all mouse motion, SGR-encoded.
const MOUSE_REPORTING_ON: &str = "\x1b[?1003h\x1b[?1006h";

/// Stop the terminal reporting mouse motion.
const MOUSE_REPORTING_OFF: &str = "\x1b[?1006l\x1b[?1003l";

/// Toggle the terminal's any-motion mouse reporting. Without it the pointer can't repel
/// anything.
pub(crate) fn set_mouse_reporting(enabled: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    if enabled {
        stdout.write_all(MOUSE_REPORTING_ON.as_bytes())?;
    } else {
        stdout.write_all(MOUSE_REPORTING_OFF.as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}
