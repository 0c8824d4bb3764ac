//! Command execution against the controller.
//!
//! One call to [`CommandEngine::execute`] is one attempt: a full
//! handshake-addressing-payload exchange. Retrying is left to the caller.

use crate::codec::Wire;
use crate::commands::{Command, Payload};
use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::responses::{CommandResult, ControllerSettings, ControllerStatus};
use crate::transport::Transport;

/// Drives the command exchange over a transport.
pub struct CommandEngine<T: Transport> {
    transport: T,
}

impl<T: Transport> CommandEngine<T> {
    /// Create an engine that owns `transport`.
    pub fn new(transport: T) -> Self {
        CommandEngine { transport }
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Run one attempt of `command`.
    ///
    /// On success a read-style command carries its result. The command's try
    /// counter is left untouched.
    pub fn execute(&mut self, command: &mut Command) -> ProtocolResult<()> {
        let kind = command.kind();
        let spec = kind.spec();

        // Encode before touching the wire so a bad value sends nothing.
        let encoded = match command.value() {
            Some(value) if kind.is_write() => Some(kind.encode_value(value)?),
            _ => None,
        };

        log::debug!(
            "executing {} on channel {} (attempt {})",
            kind,
            command.channel(),
            command.tries() + 1
        );

        self.transport
            .reset_input_buffer()
            .map_err(|e| ProtocolError::Io(e.to_string()))?;

        let mut wire = Wire::new(&mut self.transport);

        wire.write_u8(HELLO)?;
        expect(&mut wire, ACK, "handshake")?;

        wire.write_u8(spec.opcode)?;
        wire.write_u8(command.channel())?;

        match spec.payload {
            Payload::U8 { .. } => {
                let value = encoded.ok_or_else(|| missing_value(command))?;
                wire.write_u8(value as u8)?;
                expect(&mut wire, RCVD, "payload")?;
            }
            Payload::U16 { .. } => {
                let value = encoded.ok_or_else(|| missing_value(command))?;
                wire.write_u16(value)?;
                expect(&mut wire, RCVD, "payload")?;
            }
            Payload::Status => {
                let fields = [
                    wire.read_i16()?,
                    wire.read_i16()?,
                    wire.read_i16()?,
                    wire.read_i16()?,
                ];
                wire.write_u8(RCVD)?;
                command.set_result(CommandResult::Status(ControllerStatus::from_fields(
                    command.channel(),
                    fields,
                )));
            }
            Payload::Settings => {
                let fields = [
                    wire.read_u16()?,
                    wire.read_u16()?,
                    wire.read_u16()?,
                    wire.read_u16()?,
                ];
                wire.write_u8(RCVD)?;
                command.set_result(CommandResult::Settings(ControllerSettings::from_fields(
                    command.channel(),
                    fields,
                )));
            }
        }

        log::trace!("{} on channel {} complete", kind, command.channel());
        Ok(())
    }
}

fn expect<T: Transport + ?Sized>(
    wire: &mut Wire<'_, T>,
    expected: u8,
    step: &'static str,
) -> ProtocolResult<()> {
    match wire.read_u8()? {
        byte if byte == expected => Ok(()),
        ERROR => {
            log::debug!("device sent ERROR during {}", step);
            Err(ProtocolError::ErrorResponse { step })
        }
        other => Err(ProtocolError::UnexpectedResponse {
            step,
            detail: format!(
                "expected {}, got {} (0x{:02x})",
                opcode_name(expected),
                opcode_name(other),
                other
            ),
        }),
    }
}

fn missing_value(command: &Command) -> ProtocolError {
    ProtocolError::MalformedInput(format!("{} requires a value", command.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandKind;
    use crate::testing::ScriptedTransport;

    fn engine(script: ScriptedTransport) -> CommandEngine<ScriptedTransport> {
        CommandEngine::new(script)
    }

    #[test]
    fn test_set_target_wire_exchange() {
        let script = ScriptedTransport::new().reply_u8(ACK).reply_u8(RCVD);
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::SetTarget, 1, Some(42.0)).unwrap();

        engine.execute(&mut cmd).unwrap();

        assert_eq!(
            script.writes(),
            vec![vec![HELLO], vec![CMD_SET_TARGET], vec![1], vec![0xA4, 0x01]]
        );
        assert_eq!(script.read_sizes(), vec![1, 1]);
        assert_eq!(script.reset_count(), 1);
        assert!(cmd.result().is_none());
    }

    #[test]
    fn test_set_output_writes_one_byte() {
        let script = ScriptedTransport::new().reply_u8(ACK).reply_u8(RCVD);
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::SetOutput, 0, Some(255.0)).unwrap();

        engine.execute(&mut cmd).unwrap();

        assert_eq!(script.writes()[3], vec![255]);
    }

    #[test]
    fn test_get_status_wire_exchange() {
        let script = ScriptedTransport::new()
            .reply_u8(ACK)
            .reply_biased(300)
            .reply_biased(315)
            .reply_biased(7500)
            .reply_biased(42);
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::GetStatus, 2, None).unwrap();

        engine.execute(&mut cmd).unwrap();

        assert_eq!(
            script.writes(),
            vec![vec![HELLO], vec![CMD_GET_STATUS], vec![2], vec![RCVD]]
        );
        assert_eq!(script.read_sizes(), vec![1, 2, 2, 2, 2]);
        assert_eq!(
            cmd.result(),
            Some(&CommandResult::Status(ControllerStatus {
                channel: 2,
                temp: 30.0,
                target: 31.5,
                speed: 7500,
                output: 42,
            }))
        );
    }

    #[test]
    fn test_handshake_error_byte() {
        let script = ScriptedTransport::new().reply_u8(ERROR);
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::GetSettings, 0, None).unwrap();

        let err = engine.execute(&mut cmd).unwrap_err();

        assert_eq!(err, ProtocolError::ErrorResponse { step: "handshake" });
        assert_eq!(script.write_count(), 1);
        assert_eq!(script.read_count(), 1);
    }

    #[test]
    fn test_handshake_garbage_byte() {
        let script = ScriptedTransport::new().reply_u8(0x55);
        let mut engine = engine(script);
        let mut cmd = Command::new(CommandKind::GetSettings, 0, None).unwrap();

        let err = engine.execute(&mut cmd).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedResponse { step: "handshake", .. }
        ));
    }

    #[test]
    fn test_payload_rejected() {
        let script = ScriptedTransport::new().reply_u8(ACK).reply_u8(ERROR);
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::SetKp, 0, Some(1.5)).unwrap();

        let err = engine.execute(&mut cmd).unwrap_err();

        assert_eq!(err, ProtocolError::ErrorResponse { step: "payload" });
        assert_eq!(script.write_count(), 4);
        assert_eq!(script.read_count(), 2);
    }

    #[test]
    fn test_malformed_value_sends_nothing() {
        let script = ScriptedTransport::new();
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::SetOutput, 0, Some(300.0)).unwrap();

        let err = engine.execute(&mut cmd).unwrap_err();

        assert!(matches!(err, ProtocolError::MalformedInput(_)));
        assert!(!err.is_recoverable());
        assert_eq!(script.write_count(), 0);
        assert_eq!(script.reset_count(), 0);
    }

    #[test]
    fn test_truncated_status_times_out() {
        let script = ScriptedTransport::new()
            .reply_u8(ACK)
            .reply_biased(300)
            .reply(&[0x01]);
        let mut engine = engine(script.clone());
        let mut cmd = Command::new(CommandKind::GetStatus, 0, None).unwrap();

        let err = engine.execute(&mut cmd).unwrap_err();

        assert!(matches!(err, ProtocolError::Timeout { expected: 2, actual: 1 }));
        assert!(cmd.result().is_none());
        // No RCVD after a failed read.
        assert_eq!(script.write_count(), 3);
    }
}
