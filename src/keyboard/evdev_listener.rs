//! Raw evdev capture backend for Linux
//!
//! Every keyboard under `/dev/input` is grabbed exclusively (`EVIOCGRAB`) so
//! no other reader sees its events. Events the engine lets through are
//! re-injected through a uinput virtual keyboard; suppressed ones are simply
//! not written back.

use super::keymap::{self, modifier_for_key, KeyCode};
use super::{KeyEvent, KeyEventKind, KeyLookup, Modifier, Modifiers};
use crate::capture::{CaptureError, CaptureHook, HookEvent};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key};
use nix::libc;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const VIRTUAL_DEVICE_NAME: &str = "hotkey-trainer virtual keyboard";

/// How long to wait for held keys to be released before grabbing
const RELEASE_WAIT: Duration = Duration::from_secs(2);

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, CaptureError> {
    let input_dir = Path::new("/dev/input");
    let entries = fs::read_dir(input_dir).map_err(|e| CaptureError::PermissionDenied {
        detail: format!("cannot read {}: {}", input_dir.display(), e),
    })?;

    let mut keyboards: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("event"))
                .unwrap_or(false)
        })
        .filter(|path| is_keyboard_device(path))
        .collect();
    keyboards.sort();

    if keyboards.is_empty() {
        return Err(CaptureError::NoDevices);
    }
    Ok(keyboards)
}

/// Check if a device is a keyboard by examining /sys/class/input
fn is_keyboard_device(device_path: &Path) -> bool {
    let Some(name) = device_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    let caps_path = format!("/sys/class/input/{}/device/capabilities/key", name);
    if let Ok(caps) = fs::read_to_string(&caps_path) {
        // Hex bitmap of supported keys; a real keyboard maps dozens
        let total_bits: u32 = caps
            .split_whitespace()
            .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
            .map(|n| n.count_ones())
            .sum();
        return total_bits > 50;
    }

    let name_path = format!("/sys/class/input/{}/device/name", name);
    fs::read_to_string(&name_path)
        .map(|n| {
            let n = n.to_lowercase();
            n.contains("keyboard") || n.contains("kbd")
        })
        .unwrap_or(false)
}

fn set_nonblocking(device: &Device) {
    let fd = device.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

fn open_error(path: &Path, e: io::Error) -> CaptureError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        CaptureError::PermissionDenied {
            detail: format!("{}: {}", path.display(), e),
        }
    } else {
        CaptureError::Io(e)
    }
}

/// Open every accessible keyboard, skipping the ones we cannot read
fn open_devices(paths: &[PathBuf]) -> Result<Vec<(PathBuf, Device)>, CaptureError> {
    let mut devices = Vec::new();
    let mut denied = Vec::new();

    for path in paths {
        match Device::open(path) {
            Ok(device) => {
                log::debug!(
                    "opened keyboard {} ({})",
                    path.display(),
                    device.name().unwrap_or("unknown")
                );
                devices.push((path.clone(), device));
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                denied.push(path.display().to_string());
            }
            Err(e) => log::warn!("skipping {}: {}", path.display(), e),
        }
    }

    if devices.is_empty() {
        return Err(CaptureError::PermissionDenied {
            detail: format!("cannot open any keyboard device ({})", denied.join(", ")),
        });
    }
    Ok(devices)
}

/// Grabbing while a key is down leaves the OS thinking it is still held
fn wait_for_release(devices: &[(PathBuf, Device)]) {
    let deadline = Instant::now() + RELEASE_WAIT;
    while Instant::now() < deadline {
        let any_down = devices.iter().any(|(_, d)| {
            d.get_key_state()
                .map(|keys| keys.iter().next().is_some())
                .unwrap_or(false)
        });
        if !any_down {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    log::warn!("keys still held after {:?}, grabbing anyway", RELEASE_WAIT);
}

fn grab_all(devices: &mut [(PathBuf, Device)]) -> Result<(), CaptureError> {
    for (path, device) in devices.iter_mut() {
        device.grab().map_err(|e| open_error(path, e))?;
        set_nonblocking(device);
    }
    Ok(())
}

fn build_virtual_keyboard(devices: &[(PathBuf, Device)]) -> Result<VirtualDevice, CaptureError> {
    let mut keys = AttributeSet::<Key>::new();
    for (_, device) in devices {
        if let Some(supported) = device.supported_keys() {
            for key in supported.iter() {
                keys.insert(key);
            }
        }
    }
    keys.insert(Key::new(keymap::KEY_FN.0));

    let uinput_error = |e: io::Error| CaptureError::PermissionDenied {
        detail: format!("/dev/uinput: {}", e),
    };
    let device = VirtualDeviceBuilder::new()
        .map_err(uinput_error)?
        .name(VIRTUAL_DEVICE_NAME)
        .with_keys(&keys)
        .map_err(uinput_error)?
        .build()
        .map_err(uinput_error)?;
    Ok(device)
}

/// Modifier set implied by the physically held keys
fn modifiers_from_held(held: &HashSet<u16>) -> Modifiers {
    let mut mods = Modifiers::empty();
    for code in held {
        if let Some(m) = modifier_for_key(KeyCode(*code)) {
            mods.insert(m);
        }
    }
    mods
}

/// Turn one kernel key event into a [`KeyEvent`], updating the held set
fn key_event_from_raw(held: &mut HashSet<u16>, code: u16, value: i32) -> KeyEvent {
    match value {
        0 => {
            held.remove(&code);
        }
        _ => {
            held.insert(code);
        }
    }
    let kind = match (modifier_for_key(KeyCode(code)), value) {
        (Some(_), _) => KeyEventKind::ModifierChange,
        (None, 0) => KeyEventKind::Release,
        (None, _) => KeyEventKind::Press,
    };
    KeyEvent::new(KeyCode(code), kind, modifiers_from_held(held))
        .with_down(value != 0)
        .with_repeat(value == 2)
}

/// Release event for a key that went up while nobody was reading
fn release_event(code: u16, held: &HashSet<u16>) -> KeyEvent {
    let kind = match modifier_for_key(KeyCode(code)) {
        Some(_) => KeyEventKind::ModifierChange,
        None => KeyEventKind::Release,
    };
    KeyEvent::new(KeyCode(code), kind, modifiers_from_held(held)).with_down(false)
}

/// Reconcile key state after the devices were re-grabbed
///
/// Keys held before the outage and not held now get a release event for the
/// engine. Keys down on the virtual keyboard and not held now get an
/// immediate release write.
fn resync_held(
    before: &HashSet<u16>,
    now: &HashSet<u16>,
    virtual_down: &HashSet<u16>,
) -> (Vec<(u16, i32)>, Vec<KeyEvent>) {
    let mut writes: Vec<(u16, i32)> = virtual_down
        .iter()
        .filter(|code| !now.contains(*code))
        .map(|code| (*code, 0))
        .collect();
    writes.sort_unstable();

    let mut released: Vec<u16> = before.difference(now).copied().collect();
    released.sort_unstable();
    let events = released.into_iter().map(|code| release_event(code, now)).collect();
    (writes, events)
}

/// Key code the virtual keyboard uses to express a modifier
fn modifier_key(modifier: Modifier) -> Option<u16> {
    match modifier {
        Modifier::Ctrl => Some(keymap::KEY_LEFTCTRL.0),
        Modifier::Alt => Some(keymap::KEY_LEFTALT.0),
        Modifier::Shift => Some(keymap::KEY_LEFTSHIFT.0),
        Modifier::Cmd => Some(keymap::KEY_LEFTMETA.0),
        Modifier::Fn | Modifier::CapsLock => None,
    }
}

/// `(code, value)` writes that replay `event` on the virtual keyboard
///
/// A forwarded press whose modifiers were suppressed earlier gets those
/// modifiers pressed around it, so the OS sees the full combination.
/// Releases of keys the virtual keyboard never pressed are dropped.
fn forward_sequence(event: &KeyEvent, virtual_down: &HashSet<u16>) -> Vec<(u16, i32)> {
    let code = event.key.0;
    match event.kind {
        KeyEventKind::Press if event.repeat => vec![(code, 2)],
        KeyEventKind::Press => {
            let missing: Vec<u16> = event
                .modifiers
                .iter()
                .filter(|m| {
                    !virtual_down
                        .iter()
                        .any(|c| modifier_for_key(KeyCode(*c)) == Some(*m))
                })
                .filter_map(modifier_key)
                .collect();
            let mut seq: Vec<(u16, i32)> = missing.iter().map(|c| (*c, 1)).collect();
            seq.push((code, 1));
            seq.extend(missing.iter().rev().map(|c| (*c, 0)));
            seq
        }
        KeyEventKind::Release if virtual_down.contains(&code) => vec![(code, 0)],
        KeyEventKind::ModifierChange => {
            match (event.down, virtual_down.contains(&code)) {
                (true, true) => vec![(code, 2)],
                (true, false) => vec![(code, 1)],
                (false, true) => vec![(code, 0)],
                (false, false) => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Exclusive evdev capture with uinput re-injection
pub struct EvdevHook {
    devices: Vec<(PathBuf, Device)>,
    virtual_kbd: VirtualDevice,
    /// Physically held keys, across all devices
    held: HashSet<u16>,
    /// Keys the virtual keyboard currently reports down
    virtual_down: HashSet<u16>,
    pending: VecDeque<HookEvent>,
    grabbed: bool,
}

impl EvdevHook {
    /// Open, grab and mirror all keyboards
    pub fn new() -> Result<Self, CaptureError> {
        let device_paths = find_keyboard_devices()?;
        let mut devices = open_devices(&device_paths)?;
        let virtual_kbd = build_virtual_keyboard(&devices)?;

        wait_for_release(&devices);
        grab_all(&mut devices)?;
        log::info!("capturing from {} keyboard device(s)", devices.len());

        Ok(Self {
            devices,
            virtual_kbd,
            held: HashSet::new(),
            virtual_down: HashSet::new(),
            pending: VecDeque::new(),
            grabbed: true,
        })
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool, CaptureError> {
        let mut fds: Vec<libc::pollfd> = self
            .devices
            .iter()
            .map(|(_, d)| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(CaptureError::Io(err));
        }
        Ok(ready > 0)
    }

    fn read_devices(&mut self) {
        for idx in 0..self.devices.len() {
            let fetched = self.devices[idx]
                .1
                .fetch_events()
                .map(|events| events.collect::<Vec<InputEvent>>());
            let batch = match fetched {
                Ok(batch) => batch,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    let path = self.devices[idx].0.display().to_string();
                    self.pending
                        .push_back(HookEvent::Disabled(format!("{}: {}", path, e)));
                    continue;
                }
            };

            for raw in batch {
                if raw.event_type() != EventType::KEY {
                    continue;
                }
                let event = key_event_from_raw(&mut self.held, raw.code(), raw.value());
                self.pending.push_back(HookEvent::Key(event));
            }
        }
    }

    fn emit(&mut self, seq: &[(u16, i32)]) -> Result<(), CaptureError> {
        if seq.is_empty() {
            return Ok(());
        }
        let events: Vec<InputEvent> = seq
            .iter()
            .map(|(code, value)| InputEvent::new(EventType::KEY, *code, *value))
            .collect();
        self.virtual_kbd.emit(&events)?;
        for (code, value) in seq {
            match value {
                0 => {
                    self.virtual_down.remove(code);
                }
                _ => {
                    self.virtual_down.insert(*code);
                }
            }
        }
        Ok(())
    }
}

impl CaptureHook for EvdevHook {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<HookEvent>, CaptureError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        if !self.wait_readable(timeout)? {
            return Ok(None);
        }
        self.read_devices();
        Ok(self.pending.pop_front())
    }

    fn forward(&mut self, event: &KeyEvent) -> Result<(), CaptureError> {
        let seq = forward_sequence(event, &self.virtual_down);
        self.emit(&seq)
    }

    fn reenable(&mut self) -> Result<(), CaptureError> {
        for (path, device) in self.devices.iter_mut() {
            if let Err(e) = device.ungrab() {
                log::debug!("ungrab {} before re-grab: {}", path.display(), e);
            }
        }
        self.devices.clear();
        // Key events already read stay queued; only stale failure markers go
        self.pending.retain(|event| matches!(event, HookEvent::Key(_)));

        let device_paths = find_keyboard_devices()?;
        let mut devices = open_devices(&device_paths)?;
        grab_all(&mut devices)?;

        let mut now_held = HashSet::new();
        for (_, device) in &devices {
            if let Ok(keys) = device.get_key_state() {
                now_held.extend(keys.iter().map(|k| k.code()));
            }
        }
        self.devices = devices;

        let (writes, releases) = resync_held(&self.held, &now_held, &self.virtual_down);
        self.held = now_held;
        if !writes.is_empty() {
            log::debug!("releasing {} key(s) lost during the outage", writes.len());
        }
        self.emit(&writes)?;
        self.pending.extend(releases.into_iter().map(HookEvent::Key));

        log::debug!("re-grabbed {} keyboard device(s)", self.devices.len());
        Ok(())
    }

    fn release(&mut self) {
        if !self.grabbed {
            return;
        }
        self.grabbed = false;

        let stuck: Vec<(u16, i32)> = self.virtual_down.iter().map(|c| (*c, 0)).collect();
        if let Err(e) = self.emit(&stuck) {
            log::warn!("could not release virtual keys: {}", e);
        }
        for (path, device) in self.devices.iter_mut() {
            if let Err(e) = device.ungrab() {
                log::warn!("could not ungrab {}: {}", path.display(), e);
            }
        }
        log::debug!("keyboards released");
    }
}

impl Drop for EvdevHook {
    fn drop(&mut self) {
        self.release();
    }
}

/// Key names from the kernel's key table, e.g. `KEY_KP7` -> `kp7`
#[derive(Debug, Clone, Copy, Default)]
pub struct EvdevKeyLookup;

impl KeyLookup for EvdevKeyLookup {
    fn lookup(&self, code: KeyCode, _modifiers: &Modifiers) -> Option<String> {
        let name = format!("{:?}", Key::new(code.0));
        name.strip_prefix("KEY_")
            .or_else(|| name.strip_prefix("BTN_"))
            .map(|n| n.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::test_helpers::*;

    #[test]
    fn kernel_names_for_keys_outside_the_table() {
        let lookup = EvdevKeyLookup;
        assert_eq!(lookup.lookup(KeyCode(71), &Modifiers::empty()), Some("kp7".to_string()));
        assert_eq!(lookup.lookup(KeyCode(113), &Modifiers::empty()), Some("mute".to_string()));
    }

    #[test]
    fn raw_events_track_modifiers() {
        let mut held = HashSet::new();

        let shift = key_event_from_raw(&mut held, keymap::KEY_LEFTSHIFT.0, 1);
        assert_eq!(shift.kind, KeyEventKind::ModifierChange);
        assert!(shift.modifiers.shift);

        let a = key_event_from_raw(&mut held, 30, 1);
        assert_eq!(a.kind, KeyEventKind::Press);
        assert!(a.modifiers.shift && !a.repeat);

        let a_repeat = key_event_from_raw(&mut held, 30, 2);
        assert!(a_repeat.is_press() && a_repeat.repeat);

        let a_up = key_event_from_raw(&mut held, 30, 0);
        assert_eq!(a_up.kind, KeyEventKind::Release);

        let shift_up = key_event_from_raw(&mut held, keymap::KEY_LEFTSHIFT.0, 0);
        assert_eq!(shift_up.kind, KeyEventKind::ModifierChange);
        assert!(shift_up.modifiers.is_empty());
        assert!(held.is_empty());
    }

    #[test]
    fn both_sides_keep_modifier_held() {
        let mut held = HashSet::new();
        key_event_from_raw(&mut held, keymap::KEY_LEFTCTRL.0, 1);
        key_event_from_raw(&mut held, keymap::KEY_RIGHTCTRL.0, 1);
        let ev = key_event_from_raw(&mut held, keymap::KEY_LEFTCTRL.0, 0);
        assert!(ev.modifiers.ctrl);
    }

    #[test]
    fn forwarded_press_restores_suppressed_modifiers() {
        let virtual_down = HashSet::new();
        let ev = press("-", &[Modifier::Cmd, Modifier::Shift]);
        let seq = forward_sequence(&ev, &virtual_down);
        let minus = keymap::KEY_MINUS.0;
        let shift = keymap::KEY_LEFTSHIFT.0;
        let meta = keymap::KEY_LEFTMETA.0;
        assert_eq!(seq, vec![(shift, 1), (meta, 1), (minus, 1), (meta, 0), (shift, 0)]);
    }

    #[test]
    fn forwarded_press_with_modifiers_already_down() {
        let virtual_down: HashSet<u16> = [keymap::KEY_RIGHTSHIFT.0].into_iter().collect();
        let ev = press("a", &[Modifier::Shift]);
        assert_eq!(forward_sequence(&ev, &virtual_down), vec![(30, 1)]);
    }

    #[test]
    fn releases_only_for_keys_the_virtual_keyboard_pressed() {
        let mut virtual_down = HashSet::new();
        assert!(forward_sequence(&release("a", &[]), &virtual_down).is_empty());
        virtual_down.insert(30);
        assert_eq!(forward_sequence(&release("a", &[]), &virtual_down), vec![(30, 0)]);

        let shift_up = modifier_change(Modifier::Shift, &[]);
        assert!(forward_sequence(&shift_up, &HashSet::new()).is_empty());
    }

    #[test]
    fn modifier_changes_replay_as_key_writes() {
        let shift = keymap::KEY_LEFTSHIFT.0;
        let down = modifier_change(Modifier::Shift, &[Modifier::Shift]);
        assert_eq!(forward_sequence(&down, &HashSet::new()), vec![(shift, 1)]);

        let held: HashSet<u16> = [shift].into_iter().collect();
        assert_eq!(forward_sequence(&down, &held), vec![(shift, 2)]);

        let up = modifier_change(Modifier::Shift, &[]);
        assert_eq!(forward_sequence(&up, &held), vec![(shift, 0)]);
    }

    /// Replay raw writes the way the hook does, returning the virtual state
    fn replay(raw: &[(u16, i32)]) -> (Vec<Vec<(u16, i32)>>, HashSet<u16>) {
        let mut held = HashSet::new();
        let mut virtual_down = HashSet::new();
        let mut writes = Vec::new();
        for (code, value) in raw {
            let event = key_event_from_raw(&mut held, *code, *value);
            let seq = forward_sequence(&event, &virtual_down);
            for (c, v) in &seq {
                if *v == 0 {
                    virtual_down.remove(c);
                } else {
                    virtual_down.insert(*c);
                }
            }
            writes.push(seq);
        }
        assert!(held.is_empty());
        (writes, virtual_down)
    }

    #[test]
    fn releasing_one_side_while_the_other_is_held() {
        let left = keymap::KEY_LEFTCTRL.0;
        let right = keymap::KEY_RIGHTCTRL.0;
        let (writes, virtual_down) = replay(&[(left, 1), (right, 1), (left, 0), (right, 0)]);

        assert_eq!(writes[2], vec![(left, 0)]);
        assert_eq!(writes[3], vec![(right, 0)]);
        assert!(virtual_down.is_empty());

        // Opposite release order
        let (_, virtual_down) = replay(&[(left, 1), (right, 1), (right, 0), (left, 0)]);
        assert!(virtual_down.is_empty());
    }

    #[test]
    fn raw_direction_survives_shared_modifier_flag() {
        let mut held = HashSet::new();
        key_event_from_raw(&mut held, keymap::KEY_LEFTSHIFT.0, 1);
        key_event_from_raw(&mut held, keymap::KEY_RIGHTSHIFT.0, 1);
        let up = key_event_from_raw(&mut held, keymap::KEY_LEFTSHIFT.0, 0);
        assert!(up.modifiers.shift);
        assert!(!up.down);

        let repeat = key_event_from_raw(&mut held, keymap::KEY_RIGHTSHIFT.0, 2);
        assert!(repeat.down && repeat.repeat);
    }

    #[test]
    fn resync_releases_keys_lost_during_outage() {
        let shift = keymap::KEY_LEFTSHIFT.0;
        let before: HashSet<u16> = [30, shift].into_iter().collect();
        let now: HashSet<u16> = [shift].into_iter().collect();
        let virtual_down: HashSet<u16> = [30, shift].into_iter().collect();

        let (writes, events) = resync_held(&before, &now, &virtual_down);
        assert_eq!(writes, vec![(30, 0)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, KeyCode(30));
        assert_eq!(events[0].kind, KeyEventKind::Release);
        assert!(!events[0].down);
        assert!(events[0].modifiers.shift);
    }

    #[test]
    fn resync_releases_modifiers_as_modifier_changes() {
        let ctrl = keymap::KEY_LEFTCTRL.0;
        let before: HashSet<u16> = [ctrl].into_iter().collect();
        let virtual_down = before.clone();

        let (writes, events) = resync_held(&before, &HashSet::new(), &virtual_down);
        assert_eq!(writes, vec![(ctrl, 0)]);
        assert_eq!(events[0].kind, KeyEventKind::ModifierChange);
        assert!(!events[0].down);
        assert!(events[0].modifiers.is_empty());

        let (writes, events) = resync_held(&before, &before, &virtual_down);
        assert!(writes.is_empty() && events.is_empty());
    }

    #[test]
    fn device_enumeration_does_not_panic() {
        // Result depends on the machine's permissions
        match find_keyboard_devices() {
            Ok(devices) => assert!(!devices.is_empty()),
            Err(e) => assert!(e.is_subscription_failure() || matches!(e, CaptureError::Io(_))),
        }
    }
}
