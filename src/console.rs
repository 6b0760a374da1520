//! Line-oriented console for updating the emulated ambient temperature.

use anyhow::Result;
use log::info;
use std::io::{BufRead, Write};

use crate::{mcp9808::Mcp9808Emulation, session::RegisterSession, transport::Transport};

const PROMPT: &str = "Enter new ambient temperature: ";

/// Reads temperatures from `input` until `exit` or end of input. Each integer is written to the
/// ambient temperature register.
pub fn run<T, R, W>(
  session: &mut RegisterSession<T>,
  emulation: &Mcp9808Emulation,
  input: R,
  mut output: W,
) -> Result<()>
where
  T: Transport,
  R: BufRead,
  W: Write,
{
  let mut lines = input.lines();

  loop {
    write!(output, "{}", PROMPT)?;
    output.flush()?;

    let line = match lines.next() {
      Some(line) => line?,
      None => return Ok(()),
    };
    let line = line.trim();

    if line.eq_ignore_ascii_case("exit") {
      writeln!(output, "Exiting input thread.")?;
      return Ok(());
    }

    match line.parse::<u32>() {
      Ok(value) => {
        emulation.set_ambient_temperature(session, value)?;
        info!("Updated ambient temperature to: {}", value);
      }
      Err(_) => writeln!(output, "Invalid input. Please enter an integer.")?,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::run;
  use crate::mcp9808::Mcp9808Emulation;
  use crate::platform::wfg;
  use crate::session::RegisterSession;
  use crate::transport::MemoryTransport;

  fn console(input: &str) -> (MemoryTransport, String) {
    let mut session = RegisterSession::new(&wfg().unwrap().map, MemoryTransport::new());
    let mut output = Vec::new();

    run(
      &mut session,
      &Mcp9808Emulation::default(),
      input.as_bytes(),
      &mut output,
    )
    .unwrap();

    (session.into_transport(), String::from_utf8(output).unwrap())
  }

  #[test]
  fn updates_until_exit() {
    let (mem, output) = console("21\n22\nEXIT\n23\n");

    assert_eq!(22, mem.get(0x88018));
    assert!(output.ends_with("Exiting input thread.\n"));
    assert_eq!(3, output.matches("Enter new ambient temperature: ").count());
  }

  #[test]
  fn rejects_non_integers() {
    let (mem, output) = console("warm\n-4\n");

    assert!(mem.accesses().is_empty());
    assert_eq!(2, output.matches("Invalid input. Please enter an integer.").count());
  }

  #[test]
  fn stops_at_end_of_input() {
    let (mem, output) = console("");

    assert!(mem.accesses().is_empty());
    assert_eq!("Enter new ambient temperature: ", output);
  }
}
