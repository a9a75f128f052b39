//! Interactive track control.
//!
//! Usage: `track-select [config.json]`
//!
//! Reads commands from stdin (`open`, `close`, `select <id>`, `toggle`,
//! `show`, `quit`) and prints the control's view model as JSON after each.

use anyhow::{bail, Context, Result};
use std::cell::Cell;
use std::io::{self, BufRead};
use std::path::Path;
use std::rc::Rc;
use track_select::{AppConfig, TrackControl, TrackControlHandlers};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(windows)]
mod backend {
    use anyhow::Result;
    use std::cell::RefCell;
    use std::rc::Rc;
    use track_select::media::{shared, AudioTrackRef, TrackHandle, TrackSource};
    use track_select::platform::{ComGuard, CoreAudioSource, LevelMeter, VolumeController};
    use track_select::{AppConfig, MediaDeviceKind, SharedDeviceSource};

    pub struct Backend {
        pub devices: SharedDeviceSource,
        pub audio_track: Option<AudioTrackRef>,
        source: Rc<RefCell<CoreAudioSource>>,
        // Dropped last: COM must outlive every interface above
        _com: ComGuard,
    }

    impl Backend {
        pub fn new(config: &AppConfig) -> Result<Self> {
            let com = ComGuard::new()?;
            let (source, devices) = shared(CoreAudioSource::new()?);

            let audio_track = if config.kind == MediaDeviceKind::AudioInput {
                let endpoints = source.borrow();
                match endpoints.endpoints().default_device_id(config.kind)? {
                    Some(device_id) => {
                        let meter = LevelMeter::new(&endpoints.endpoints().device(&device_id)?)?;
                        let track = TrackHandle::new("local-microphone", TrackSource::Microphone)
                            .with_device(device_id);
                        Some(AudioTrackRef::new(track, Rc::new(meter)))
                    }
                    None => None,
                }
            } else {
                None
            };

            Ok(Self {
                devices,
                audio_track,
                source,
                _com: com,
            })
        }

        /// Apply the toggle result by muting the active endpoint.
        pub fn apply_pressed(&self, device_id: Option<&str>, pressed: bool) -> Result<()> {
            if let Some(device_id) = device_id {
                let device = self.source.borrow().endpoints().device(device_id)?;
                VolumeController::new(&device)?.set_mute(!pressed)?;
            }
            Ok(())
        }
    }
}

#[cfg(not(windows))]
mod backend {
    use anyhow::Result;
    use std::rc::Rc;
    use track_select::media::{
        shared, AudioTrackRef, ManualLevelSource, MediaDeviceInfo, TrackHandle,
    };
    use track_select::{AppConfig, MediaDeviceKind, MemoryDeviceSource, SharedDeviceSource};

    pub struct Backend {
        pub devices: SharedDeviceSource,
        pub audio_track: Option<AudioTrackRef>,
        levels: Rc<ManualLevelSource>,
        frame: std::cell::Cell<u32>,
    }

    fn demo_devices(kind: MediaDeviceKind) -> Vec<MediaDeviceInfo> {
        let labels = match kind {
            MediaDeviceKind::AudioInput => ["Built-in Microphone", "USB Headset Microphone"],
            MediaDeviceKind::AudioOutput => ["Built-in Speakers", "USB Headset"],
            MediaDeviceKind::VideoInput => ["FaceTime HD Camera", "USB Webcam"],
        };
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| MediaDeviceInfo::new(format!("{}-{}", kind, i + 1), *label, kind))
            .collect()
    }

    impl Backend {
        pub fn new(config: &AppConfig) -> Result<Self> {
            let devices = if config.devices.is_empty() {
                demo_devices(config.kind)
            } else {
                config.devices.clone()
            };
            let first = devices
                .iter()
                .find(|d| d.kind == config.kind && !d.is_placeholder())
                .map(|d| d.device_id.clone());

            let mut memory = MemoryDeviceSource::with_devices(devices);
            // A published track implies access was granted when it was captured
            memory.grant(config.kind);
            if let Some(device_id) = &first {
                memory.set_active(config.kind, device_id);
            }
            let (_, devices) = shared(memory);

            let levels = Rc::new(ManualLevelSource::new());
            let audio_track = (config.kind == MediaDeviceKind::AudioInput).then(|| {
                let mut track = TrackHandle::new("local-microphone", config.track_options().source);
                track.device_id = first;
                AudioTrackRef::new(track, levels.clone())
            });

            Ok(Self {
                devices,
                audio_track,
                levels,
                frame: std::cell::Cell::new(0),
            })
        }

        pub fn apply_pressed(&self, _device_id: Option<&str>, pressed: bool) -> Result<()> {
            self.levels.set_muted(!pressed);
            Ok(())
        }

        /// Feed the meter a slowly varying synthetic level.
        pub fn refresh_levels(&self) {
            let frame = self.frame.get().wrapping_add(1);
            self.frame.set(frame);
            let level = 0.05 + 0.05 * (frame % 8) as f32;
            self.levels.set_peaks(vec![level, level * 0.8]);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Open,
    Close,
    Select(String),
    Toggle,
    Show,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let mut parts = line.split_whitespace();
    let command = match (parts.next(), parts.next()) {
        (Some("open"), None) => Command::Open,
        (Some("close"), None) => Command::Close,
        (Some("select"), Some(id)) => Command::Select(id.to_string()),
        (Some("toggle"), None) => Command::Toggle,
        (Some("show") | None, None) => Command::Show,
        (Some("quit" | "exit"), None) => Command::Quit,
        _ => bail!("Unknown command: {}", line.trim()),
    };
    if parts.next().is_some() {
        bail!("Unexpected arguments: {}", line.trim());
    }
    Ok(command)
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn print_view(control: &TrackControl) -> Result<()> {
    let json = serde_json::to_string_pretty(&control.view())?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            AppConfig::load(Path::new(&path)).with_context(|| format!("loading config {path}"))?
        }
        None => AppConfig::default(),
    };
    init_tracing(config.log_level.as_deref());

    let backend = backend::Backend::new(&config).context("initializing device source")?;

    let requested = Rc::new(Cell::new(None));
    let on_pressed = requested.clone();
    let mut control = TrackControl::new(
        backend.devices.clone(),
        config.track_options(),
        backend.audio_track.clone(),
        TrackControlHandlers::new()
            .on_pressed_change(move |pressed| on_pressed.set(Some(pressed)))
            .on_media_device_error(|err| error!(%err, "Media device error"))
            .on_active_device_change(|device_id| info!(device_id, "Active device selected")),
    );
    info!(kind = %config.kind, "Track control ready");

    control.process_events();
    print_view(&control)?;

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match command {
            Command::Open => control.device_select_mut().open(),
            Command::Close => control.device_select_mut().close(),
            Command::Select(device_id) => control.device_select_mut().select_device(&device_id),
            Command::Toggle => {
                control.toggle();
            }
            Command::Show => {}
            Command::Quit => break,
        }

        if let Some(pressed) = requested.take() {
            control.set_pending(true);
            let active = control.device_select().active_device_id().map(str::to_string);
            match backend.apply_pressed(active.as_deref(), pressed) {
                Ok(()) => control.set_pressed(pressed),
                Err(err) => error!(%err, "Failed to apply track state"),
            }
            control.set_pending(false);
        }

        // LevelMeter reads the endpoint live; only the synthetic source needs feeding
        #[cfg(not(windows))]
        backend.refresh_levels();
        control.process_events();
        control.tick();
        print_view(&control)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("open").unwrap(), Command::Open);
        assert_eq!(parse_command("  close ").unwrap(), Command::Close);
        assert_eq!(
            parse_command("select a2").unwrap(),
            Command::Select("a2".to_string())
        );
        assert_eq!(parse_command("").unwrap(), Command::Show);
        assert_eq!(parse_command("exit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("select").is_err());
        assert!(parse_command("toggle now").is_err());
        assert!(parse_command("dance").is_err());
    }
}
