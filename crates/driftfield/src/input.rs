//! Handle all the raw input directly from the end user.
//!
//! Mouse movement becomes pointer events for the field, `q`/Ctrl-c ends the whole application
//! and Escape simulates the pointer leaving the surface.

use std::io::Read as _;

use color_eyre::eyre::Result;

use crate::run::Protocol;

/// Bytes from STDIN
type BytesFromSTDIN = [u8; 128];

/// Handle input from the user
pub(crate) struct Input {
    /// The main driftfield protocol channel.
    protocol_tx: tokio::sync::broadcast::Sender<Protocol>,
}

impl Input {
    /// Start a thread to listen and parse the end user's STDIN and forward it to the rest of
    /// the application.
    pub fn start(
        protocol_tx: tokio::sync::broadcast::Sender<Protocol>,
    ) -> std::thread::JoinHandle<std::result::Result<(), color_eyre::eyre::Error>> {
        // The Tokio docs actually suggest using `std::thread` to listen on STDIN for interactive
        // applications.
        std::thread::spawn(move || -> Result<()> {
            let protocol_for_shutdown = protocol_tx.clone();
            let input = Self { protocol_tx };
            let result = input.consume_stdin();
            if let Err(error) = result {
                crate::run::broadcast_protocol_end(&protocol_for_shutdown);
                return Err(error);
            }
            Ok(())
        })
    }

    /// Listen to the end user's STDIN and parse the bytes into known mouse/keyboard events.
    fn consume_stdin(&self) -> Result<()> {
        tracing::debug!("Starting to listen on STDIN");

        let stdin = std::io::stdin();
        let mut reader = std::io::BufReader::new(stdin);
        let mut parser = termwiz::input::InputParser::new();

        loop {
            let mut buffer: BytesFromSTDIN = [0; 128];
            match reader.read(&mut buffer[..]) {
                Ok(n) => {
                    let mut saw_end = false;
                    if let Some(bytes) = buffer.get(0..n) {
                        parser.parse(
                            bytes,
                            |event| {
                                saw_end |= self.parsed_event_callback(&event);
                            },
                            false,
                        );
                    } else {
                        tracing::warn!("Couldn't get bytes from STDIN input buffer");
                    }
                    if saw_end {
                        // Keeping the thread alive after the end message would just mean
                        // swallowing the user's keystrokes while the terminal restores itself.
                        tracing::debug!("STDIN thread finished after the end of the application");
                        return Ok(());
                    }
                }
                Err(err) => {
                    return Err(color_eyre::eyre::Error::new(err));
                }
            }
        }
    }

    /// The callback for when the input parser detects known keyboard/mouse events. Returns
    /// whether the event ended the application.
    fn parsed_event_callback(&self, event: &termwiz::input::InputEvent) -> bool {
        tracing::trace!("Parsed input event: {event:?}");

        let Some(message) = Self::protocol_message_for_event(event) else {
            return false;
        };
        let is_end = matches!(message, Protocol::End);

        let result = self.protocol_tx.send(message);
        if let Err(error) = result {
            tracing::error!("Error sending input event from thread to task: {error:?}");
        }

        is_end
    }

    /// Translate a raw terminal event into our protocol, if it means anything to us.
    #[expect(
        clippy::wildcard_enum_match_arm,
        clippy::cast_precision_loss,
        clippy::as_conversions,
        reason = "Unknown input is simply ignored, and terminals aren't 2^23 cells wide"
    )]
    fn protocol_message_for_event(event: &termwiz::input::InputEvent) -> Option<Protocol> {
        match event {
            termwiz::input::InputEvent::Mouse(mouse) => {
                // SGR mouse coordinates are 1-based.
                let column = mouse.x.saturating_sub(1);
                let row = mouse.y.saturating_sub(1);
                Some(Protocol::PointerMove {
                    x: f32::from(column),
                    y: f32::from(row) * 2.0,
                })
            }
            termwiz::input::InputEvent::Key(key) => Self::protocol_message_for_key(key),
            termwiz::input::InputEvent::Resized { cols, rows } => Some(Protocol::Resize {
                width: *cols as f32,
                height: (rows * 2) as f32,
            }),
            _ => None,
        }
    }

    /// The few keys we care about.
    #[expect(
        clippy::wildcard_enum_match_arm,
        reason = "Unknown input is simply ignored"
    )]
    fn protocol_message_for_key(key: &termwiz::input::KeyEvent) -> Option<Protocol> {
        match key.key {
            termwiz::input::KeyCode::Char('q') => Some(Protocol::End),
            termwiz::input::KeyCode::Char('c')
                if key.modifiers.contains(termwiz::input::Modifiers::CTRL) =>
            {
                Some(Protocol::End)
            }
            termwiz::input::KeyCode::Escape => Some(Protocol::PointerLeave),
            _ => None,
        }
    }
}

#[cfg(test)]
#[expect(clippy::panic, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    fn key(key_code: termwiz::input::KeyCode, modifiers: termwiz::input::Modifiers) -> termwiz::input::InputEvent {
        termwiz::input::InputEvent::Key(termwiz::input::KeyEvent {
            key: key_code,
            modifiers,
        })
    }

    #[test]
    fn quit_keys_end_the_application() {
        let quit = key(
            termwiz::input::KeyCode::Char('q'),
            termwiz::input::Modifiers::NONE,
        );
        assert!(matches!(
            Input::protocol_message_for_event(&quit),
            Some(Protocol::End)
        ));

        let interrupt = key(
            termwiz::input::KeyCode::Char('c'),
            termwiz::input::Modifiers::CTRL,
        );
        assert!(matches!(
            Input::protocol_message_for_event(&interrupt),
            Some(Protocol::End)
        ));

        let plain_c = key(
            termwiz::input::KeyCode::Char('c'),
            termwiz::input::Modifiers::NONE,
        );
        assert!(Input::protocol_message_for_event(&plain_c).is_none());
    }

    #[test]
    fn escape_clears_the_pointer() {
        let escape = key(
            termwiz::input::KeyCode::Escape,
            termwiz::input::Modifiers::NONE,
        );
        assert!(matches!(
            Input::protocol_message_for_event(&escape),
            Some(Protocol::PointerLeave)
        ));
    }

    #[test]
    fn the_end_message_finishes_the_stdin_callback() {
        let (protocol_tx, mut protocol_rx) = tokio::sync::broadcast::channel::<Protocol>(16);
        let input = Input { protocol_tx };

        let escape = key(
            termwiz::input::KeyCode::Escape,
            termwiz::input::Modifiers::NONE,
        );
        assert!(!input.parsed_event_callback(&escape));

        let quit = key(
            termwiz::input::KeyCode::Char('q'),
            termwiz::input::Modifiers::NONE,
        );
        assert!(input.parsed_event_callback(&quit));

        assert!(matches!(protocol_rx.try_recv(), Ok(Protocol::PointerLeave)));
        assert!(matches!(protocol_rx.try_recv(), Ok(Protocol::End)));
    }

    #[test]
    fn resizes_are_converted_to_pixels() {
        let resize = termwiz::input::InputEvent::Resized { cols: 80, rows: 24 };
        let Some(Protocol::Resize { width, height }) =
            Input::protocol_message_for_event(&resize)
        else {
            panic!("Resize event wasn't converted");
        };
        assert!((width - 80.0).abs() < f32::EPSILON);
        assert!((height - 48.0).abs() < f32::EPSILON);
    }
}
