//! Launchpad hardware I/O over midir
//!
//! Opens the input/output port pair of one configured device, forwards
//! inbound messages to the host loop and exposes the output side as a
//! [`MidiTransport`].

use anyhow::{anyhow, Context, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::combination::InstanceId;
use crate::config::DeviceConfig;
use crate::error::SurfaceError;
use crate::launchpad::address::DeviceVariant;
use crate::launchpad::output_gate::MidiTransport;
use crate::midi::format_hex;

/// Raw message received from one device
#[derive(Debug, Clone)]
pub struct InboundMidi {
    pub instance: InstanceId,
    pub data: Vec<u8>,
}

/// Output half of a device connection
pub struct MidirTransport {
    port_name: String,
    conn: MidiOutputConnection,
}

impl MidirTransport {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiTransport for MidirTransport {
    fn send(&mut self, bytes: &[u8]) -> crate::error::Result<()> {
        trace!("-> {}: {}", self.port_name, format_hex(bytes));
        self.conn
            .send(bytes)
            .map_err(|e| SurfaceError::Transport(format!("{}: {}", self.port_name, e)))
    }
}

/// Live connection to one Launchpad
///
/// Dropping it closes the input port; the output half lives in the surface.
pub struct DeviceConnection {
    pub input_port: String,
    _input: MidiInputConnection<()>,
}

/// Index of the first port whose name contains one of `patterns`
///
/// Case-insensitive; patterns are tried in order so the first pattern wins
/// over later ones even if a later one matches an earlier port.
pub fn match_port(names: &[String], patterns: &[String]) -> Option<usize> {
    patterns.iter().find_map(|pattern| {
        let pattern = pattern.to_lowercase();
        names
            .iter()
            .position(|name| name.to_lowercase().contains(&pattern))
    })
}

fn input_port_names(midi_in: &MidiInput) -> Vec<String> {
    midi_in
        .ports()
        .iter()
        .map(|port| midi_in.port_name(port).unwrap_or_default())
        .collect()
}

fn output_port_names(midi_out: &MidiOutput) -> Vec<String> {
    midi_out
        .ports()
        .iter()
        .map(|port| midi_out.port_name(port).unwrap_or_default())
        .collect()
}

/// Open both ports of a configured device
///
/// Inbound messages (SysEx included) are pushed into `events` tagged with
/// `instance`; a full channel drops the message.
pub fn open(
    instance: InstanceId,
    device: &DeviceConfig,
    events: mpsc::Sender<InboundMidi>,
) -> Result<(DeviceConnection, MidirTransport)> {
    let input_patterns = device.input_patterns();
    let output_patterns = device.output_patterns();
    info!(
        "Connecting {} '{}' - Input: {:?}, Output: {:?}",
        device.variant, device.name, input_patterns, output_patterns
    );

    let mut midi_in =
        MidiInput::new("Launchpad-GW-Input").context("Failed to create MIDI input")?;
    // SysEx carries the challenge response
    midi_in.ignore(Ignore::None);

    let in_names = input_port_names(&midi_in);
    debug!("Found {} MIDI input ports", in_names.len());
    let in_index = match_port(&in_names, &input_patterns)
        .ok_or_else(|| anyhow!("Input port {:?} not found", input_patterns))?;
    let in_port = midi_in
        .ports()
        .get(in_index)
        .cloned()
        .ok_or_else(|| anyhow!("Input port list changed while connecting"))?;
    let input_port = in_names[in_index].clone();

    let name = device.name.clone();
    let input = midi_in
        .connect(
            &in_port,
            "Launchpad-GW",
            move |_timestamp, data, _| {
                trace!("<- {}: {}", name, format_hex(data));
                let _ = events.try_send(InboundMidi {
                    instance,
                    data: data.to_vec(),
                });
            },
            (),
        )
        .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", input_port, e))?;
    info!("Input port connected: {}", input_port);

    let midi_out =
        MidiOutput::new("Launchpad-GW-Output").context("Failed to create MIDI output")?;
    let out_names = output_port_names(&midi_out);
    let out_index = match_port(&out_names, &output_patterns)
        .ok_or_else(|| anyhow!("Output port {:?} not found", output_patterns))?;
    let out_port = midi_out
        .ports()
        .get(out_index)
        .cloned()
        .ok_or_else(|| anyhow!("Output port list changed while connecting"))?;
    let port_name = out_names[out_index].clone();

    let conn = midi_out
        .connect(&out_port, "Launchpad-GW")
        .map_err(|e| anyhow!("Failed to connect to output port '{}': {}", port_name, e))?;
    info!("Output port connected: {}", port_name);

    Ok((
        DeviceConnection {
            input_port,
            _input: input,
        },
        MidirTransport { port_name, conn },
    ))
}

/// Variant whose suggested names match a port, if any
fn suggested_variant(name: &str) -> Option<DeviceVariant> {
    // MK2 first: "Launchpad" alone would also match it
    [DeviceVariant::Mk2Rgb, DeviceVariant::Classic]
        .into_iter()
        .find(|variant| {
            let patterns: Vec<String> =
                variant.suggested_ports().iter().map(|p| p.to_string()).collect();
            match_port(&[name.to_string()], &patterns).is_some()
        })
}

/// Print every MIDI port, flagging the ones that look like a Launchpad
pub fn list_ports_formatted() -> Result<()> {
    use colored::*;

    let midi_in = MidiInput::new("Launchpad-GW-List").context("Failed to create MIDI input")?;
    let midi_out = MidiOutput::new("Launchpad-GW-List").context("Failed to create MIDI output")?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    for (title, names) in [
        ("Input Ports:", input_port_names(&midi_in)),
        ("Output Ports:", output_port_names(&midi_out)),
    ] {
        println!("\n{}", title.bold());
        if names.is_empty() {
            println!("  {}", "No ports found".dimmed());
            continue;
        }
        for name in names {
            match suggested_variant(&name) {
                Some(variant) => println!("  {} {}", format!("[{}]", variant).green(), name),
                None => println!("  {} {}", "[OTHER]".dimmed(), name),
            }
        }
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let ports = names(&["Midi Through", "2- LAUNCHPAD MK2 20:0"]);

        assert_eq!(match_port(&ports, &names(&["launchpad mk2"])), Some(1));
        assert_eq!(match_port(&ports, &names(&["X-Touch"])), None);
    }

    #[test]
    fn test_earlier_pattern_wins() {
        let ports = names(&["Launchpad", "Launchpad S"]);

        assert_eq!(
            match_port(&ports, &names(&["Launchpad S", "Launchpad"])),
            Some(1)
        );
    }

    #[test]
    fn test_suggested_variant() {
        assert_eq!(
            suggested_variant("Launchpad MK2 MIDI 1"),
            Some(DeviceVariant::Mk2Rgb)
        );
        assert_eq!(
            suggested_variant("Launchpad Mini"),
            Some(DeviceVariant::Classic)
        );
        assert_eq!(suggested_variant("nanoKONTROL2"), None);
    }
}
