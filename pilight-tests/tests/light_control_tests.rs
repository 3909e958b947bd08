//! Integration Tests für LightControl
//!
//! Diese Tests laufen auf dem Host (x86_64) und nutzen MockController

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pilight_core::{
    ControlAction, ControllerError, FadeSettings, FadeTask, LightConfig, LightControl,
    LightError, Pin, PowerState, PwmController, TaskSpawner,
};
use rgb::RGB8;

// ============================================================================
// Mock Controller
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub pin: Pin,
    pub value: u8,
    pub at: Instant,
}

/// Zeichnet jeden Schreibzugriff auf und liefert gesetzte Duty-Cycles zurück
pub struct MockController {
    writes: Mutex<Vec<PinWrite>>,
    duty: Mutex<HashMap<Pin, u8>>,
    connected: AtomicBool,
}

impl MockController {
    pub fn new() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            duty: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Startwert eines Pins (für den Fade-Seed)
    pub fn preset(&self, pin: Pin, value: u8) {
        self.duty.lock().unwrap().insert(pin, value);
    }

    pub fn writes(&self) -> Vec<PinWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Nur (pin, value) ohne Zeitstempel
    pub fn values(&self) -> Vec<(Pin, u8)> {
        self.writes().iter().map(|w| (w.pin, w.value)).collect()
    }

    /// Zuletzt geschriebener (oder vorgegebener) Duty-Cycle eines Pins
    pub fn duty(&self, pin: Pin) -> u8 {
        self.duty.lock().unwrap().get(&pin).copied().unwrap_or(0)
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }
}

impl PwmController for MockController {
    fn set_duty_cycle(&self, pin: Pin, value: u8) -> Result<(), ControllerError> {
        if !self.is_connected() {
            return Err(ControllerError::Unreachable);
        }
        self.writes.lock().unwrap().push(PinWrite {
            pin,
            value,
            at: Instant::now(),
        });
        self.duty.lock().unwrap().insert(pin, value);
        Ok(())
    }

    fn duty_cycle(&self, pin: Pin) -> Result<u8, ControllerError> {
        if !self.is_connected() {
            return Err(ControllerError::Unreachable);
        }
        Ok(self.duty.lock().unwrap().get(&pin).copied().unwrap_or(0))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Zählt gestartete Worker und lässt sie auf tokio laufen
#[derive(Default)]
pub struct CountingSpawner {
    spawned: AtomicUsize,
}

impl CountingSpawner {
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl TaskSpawner for CountingSpawner {
    fn spawn(&self, task: FadeTask) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(task);
    }
}

// ============================================================================
// Setup
// ============================================================================

type Control = LightControl<Arc<MockController>>;

struct House {
    control: Arc<Control>,
    mocks: HashMap<String, Arc<MockController>>,
}

impl House {
    fn build(config: &LightConfig, settings: FadeSettings) -> Self {
        let mut mocks = HashMap::new();
        let control = LightControl::from_config(config, settings, |address| {
            let mock = Arc::new(MockController::new());
            mocks.insert(address.to_string(), Arc::clone(&mock));
            mock
        })
        .unwrap();

        Self {
            control: Arc::new(control),
            mocks,
        }
    }

    fn mock(&self, address: &str) -> &MockController {
        &self.mocks[address]
    }
}

fn house_config() -> LightConfig {
    LightConfig::new()
        .with_light("192.168.0.10", "ub", "13,19,26")
        .with_light("192.168.0.10", "lb", "16,20,21")
        .with_light("192.168.0.6", "ur", "18,23,24")
        .with_light("192.168.0.6", "lr", "16,20,21")
        .with_light("192.168.0.6", "ul", "17,27,22")
        .with_light("192.168.0.6", "ll", "13,19,26")
}

fn fast_fade() -> FadeSettings {
    fade_every(2)
}

fn fade_every(ms: u64) -> FadeSettings {
    FadeSettings::new()
        .with_step_size(5)
        .with_fade_time(embassy_time::Duration::from_millis(ms))
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ============================================================================
// Tests: Static Set
// ============================================================================

#[test]
fn test_set_static_color_writes_rgb_pins() {
    let config = LightConfig::new().with_light("10.0.0.1", "a", "1,2,3");
    let house = House::build(&config, FadeSettings::new());

    let report = house
        .control
        .set_static_color(["a"], RGB8::new(255, 0, 128));

    assert!(report.is_complete());
    assert_eq!(report.applied, ["a"]);
    assert_eq!(house.mock("10.0.0.1").values(), [(1, 255), (2, 0), (3, 128)]);
    assert!(!house.control.fades().is_enabled("a"));
}

#[test]
fn test_set_lights_from_form_fields() {
    let house = House::build(&house_config(), FadeSettings::new());

    let report = house.control.set_lights(
        RGB8::new(10, 20, 30),
        ["lights[ub]", "lights[ur]", "lights[ub]", "lights[xx]", "color"],
    );

    assert_eq!(report.applied, ["ub", "ur"]);
    assert_eq!(report.skipped, [LightError::UnknownLight("xx".into())]);
    assert_eq!(house.mock("192.168.0.10").values(), [(13, 10), (19, 20), (26, 30)]);
    assert_eq!(house.mock("192.168.0.6").values(), [(18, 10), (23, 20), (24, 30)]);
}

#[test]
fn test_shared_pin_numbers_stay_on_their_controller() {
    // "lb" und "lr" nutzen dieselben Pins auf verschiedenen Pis
    let house = House::build(&house_config(), FadeSettings::new());

    house.control.set_static_color(["lr"], RGB8::new(1, 2, 3));

    assert!(house.mock("192.168.0.10").values().is_empty());
    assert_eq!(house.mock("192.168.0.6").values(), [(16, 1), (20, 2), (21, 3)]);
}

#[test]
fn test_current_color_reads_pins() {
    let house = House::build(&house_config(), FadeSettings::new());
    let mock = house.mock("192.168.0.6");
    mock.preset(18, 200);
    mock.preset(23, 100);
    mock.preset(24, 50);

    assert_eq!(house.control.current_color("ur"), Ok(RGB8::new(200, 100, 50)));
    assert_eq!(
        house.control.current_color("xx"),
        Err(LightError::UnknownLight("xx".into()))
    );
}

// ============================================================================
// Tests: Global Control
// ============================================================================

#[test]
fn test_set_all_on_and_off() {
    let house = House::build(&house_config(), FadeSettings::new());

    house.control.set_all(PowerState::On);
    let back = house.mock("192.168.0.10").values();
    let front = house.mock("192.168.0.6").values();
    assert_eq!(back.len(), 6);
    assert_eq!(front.len(), 12);
    assert!(back.iter().chain(&front).all(|&(_, value)| value == 255));

    house.mock("192.168.0.10").clear();
    house.mock("192.168.0.6").clear();

    house.control.fades().enable("ub").unwrap();
    house.control.set_all(PowerState::Off);
    assert_eq!(house.control.fades().fading().count(), 0);

    house.control.fades().enable("ll").unwrap();
    house.control.set_all(PowerState::Off);
    assert_eq!(house.control.fades().fading().count(), 0);

    let back = house.mock("192.168.0.10").values();
    assert_eq!(back.len(), 12);
    assert!(back.iter().all(|&(_, value)| value == 0));
    assert_eq!(back[..6], back[6..]);
}

#[test]
fn test_set_all_skips_unreachable_controller() {
    let house = House::build(&house_config(), FadeSettings::new());
    house.mock("192.168.0.6").set_connected(false);

    house.control.set_all(PowerState::Off);

    assert_eq!(house.mock("192.168.0.10").write_count(), 6);
    assert_eq!(house.mock("192.168.0.6").write_count(), 0);
}

#[test]
fn test_set_static_color_reports_unreachable() {
    let house = House::build(&house_config(), FadeSettings::new());
    house.mock("192.168.0.6").set_connected(false);

    let report = house
        .control
        .set_static_color(["ur", "ub"], RGB8::new(9, 9, 9));

    assert_eq!(report.applied, ["ub"]);
    assert_eq!(
        report.skipped,
        [LightError::ControllerUnreachable("ur".into())]
    );
}

// ============================================================================
// Tests: Fade Orchestrator
// ============================================================================

#[tokio::test]
async fn test_start_fade_unknown_light() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();

    let report = house.control.start_fade(["unknown_light"], &spawner);
    assert!(report.applied.is_empty());
    assert_eq!(
        report.skipped,
        [LightError::UnknownLight("unknown_light".into())]
    );
    assert_eq!(spawner.spawned(), 0);

    let report = house.control.start_fade(["xx", "ub"], &spawner);

    assert_eq!(report.applied, ["ub"]);
    assert_eq!(report.skipped, [LightError::UnknownLight("xx".into())]);
    assert_eq!(spawner.spawned(), 1);

    house.control.fades().disable_all();
}

#[tokio::test]
async fn test_fade_writes_stay_within_bounds() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();
    let mock = house.mock("192.168.0.10");
    mock.preset(13, 255);
    mock.preset(19, 255);
    mock.preset(26, 0);

    house.control.start_fade(["ub"], &spawner);
    sleep_ms(200).await;
    house.control.fades().disable("ub").unwrap();

    let writes = mock.values();
    assert!(writes.len() > 10, "fade produced only {} writes", writes.len());
    assert!(writes.iter().all(|&(pin, _)| [13, 19, 26].contains(&pin)));
    assert!(writes.iter().all(|&(_, value)| (5..=255).contains(&value)));
    // Grün wird zuerst gedimmt
    assert_eq!(writes[0], (19, 250));
}

#[tokio::test]
async fn test_fade_stops_after_disable() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();
    let mock = house.mock("192.168.0.6");

    house.control.start_fade(["ur"], &spawner);
    sleep_ms(50).await;
    assert!(mock.write_count() > 0);

    let stopped_at = Instant::now();
    house.control.fades().disable("ur").unwrap();
    // Der Worker prüft sein Flag vor jedem Schreibzugriff
    sleep_ms(100).await;

    let late = mock
        .writes()
        .iter()
        .filter(|w| w.at >= stopped_at)
        .count();
    assert_eq!(late, 0);
    assert!(!house.control.fades().has_worker("ur"));
}

#[tokio::test]
async fn test_static_color_cancels_fade() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();

    house.control.start_fade(["ll"], &spawner);
    assert!(house.control.fades().is_enabled("ll"));

    house.control.set_static_color(["ll"], RGB8::new(0, 0, 255));
    assert!(!house.control.fades().is_enabled("ll"));

    sleep_ms(50).await;
    assert!(!house.control.fades().has_worker("ll"));
}

#[tokio::test]
async fn test_all_off_is_not_overwritten_by_sleeping_worker() {
    let house = House::build(&house_config(), fade_every(20));
    let spawner = CountingSpawner::default();
    let mock = house.mock("192.168.0.10");
    // Grün erreicht nach zwei Schritten die untere Grenze, dann ist Blau dran
    mock.preset(13, 255);
    mock.preset(19, 10);
    mock.preset(26, 100);

    house.control.start_fade(["ub"], &spawner);
    sleep_ms(30).await;
    assert!(mock.write_count() > 0);

    let off_at = Instant::now();
    house.control.set_all(PowerState::Off);
    sleep_ms(100).await;

    let lit: Vec<_> = mock
        .writes()
        .into_iter()
        .filter(|w| w.at >= off_at && w.value != 0)
        .collect();
    assert!(lit.is_empty(), "fade wrote after all-off: {lit:?}");
    for pin in [13, 19, 26] {
        assert_eq!(mock.duty(pin), 0, "pin {pin} left lit");
    }
    assert!(!house.control.fades().has_worker("ub"));
}

#[tokio::test]
async fn test_static_color_is_not_overwritten_by_sleeping_worker() {
    let house = House::build(&house_config(), fade_every(20));
    let spawner = CountingSpawner::default();
    let mock = house.mock("192.168.0.10");
    mock.preset(13, 255);
    mock.preset(19, 10);
    mock.preset(26, 100);

    house.control.start_fade(["ub"], &spawner);
    sleep_ms(30).await;

    let report = house.control.set_static_color(["ub"], RGB8::new(1, 2, 3));
    assert_eq!(report.applied, ["ub"]);
    sleep_ms(100).await;

    assert_eq!([mock.duty(13), mock.duty(19), mock.duty(26)], [1, 2, 3]);
    assert_eq!(mock.values().last(), Some(&(26, 3)));
}

#[tokio::test]
async fn test_restart_while_worker_sleeps_keeps_one_writer() {
    let house = House::build(&house_config(), fade_every(10));
    let spawner = CountingSpawner::default();
    let mock = house.mock("192.168.0.10");
    mock.preset(13, 255);
    mock.preset(19, 255);

    house.control.start_fade(["ub"], &spawner);
    sleep_ms(25).await;
    assert!(mock.write_count() > 0);

    // Worker steckt in Timer::after, seine Registrierung besteht noch
    house.control.fades().disable("ub").unwrap();
    house.control.start_fade(["ub"], &spawner);
    assert_eq!(spawner.spawned(), 1);
    assert!(house.control.fades().has_worker("ub"));

    sleep_ms(150).await;
    assert!(house.control.fades().has_worker("ub"));
    assert!(house.control.fades().is_enabled("ub"));
    house.control.fades().disable_all();

    // Ein einziger Schreiber: zwischen zwei Writes liegt immer ein fade_time
    let writes = mock.writes();
    assert!(writes.len() > 10, "fade produced only {} writes", writes.len());
    for pair in writes.windows(2) {
        let gap = pair[1].at.duration_since(pair[0].at);
        assert!(gap >= Duration::from_millis(9), "writes only {gap:?} apart");
    }
}

#[tokio::test]
async fn test_no_second_worker_for_running_fade() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();

    house.control.start_fade(["ub"], &spawner);
    let generation = house.control.fades().generation("ub");
    house.control.start_fade(["ub"], &spawner);

    assert_eq!(spawner.spawned(), 1);
    assert_eq!(house.control.fades().generation("ub"), generation + 1);
    assert!(house.control.fades().is_enabled("ub"));

    house.control.fades().disable_all();
}

#[tokio::test]
async fn test_fade_restarts_after_worker_stopped() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();

    house.control.start_fade(["lb"], &spawner);
    house.control.fades().disable("lb").unwrap();
    sleep_ms(50).await;
    assert!(!house.control.fades().has_worker("lb"));

    house.control.start_fade(["lb"], &spawner);
    assert_eq!(spawner.spawned(), 2);
    assert!(house.control.fades().has_worker("lb"));

    house.control.fades().disable_all();
}

#[tokio::test]
async fn test_fade_on_unreachable_controller_does_not_write() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();
    house.mock("192.168.0.6").set_connected(false);

    let report = house.control.start_fade(["ul"], &spawner);
    sleep_ms(30).await;

    assert_eq!(report.applied, ["ul"]);
    assert_eq!(house.mock("192.168.0.6").write_count(), 0);

    house.control.fades().disable_all();
}

// ============================================================================
// Tests: Control Button
// ============================================================================

#[tokio::test]
async fn test_control_button_fade_without_lights() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();

    let report = house
        .control
        .control_button(ControlAction::Fade, ["color"], &spawner);

    assert!(report.applied.is_empty());
    assert_eq!(spawner.spawned(), 0);
    assert_eq!(house.control.fades().fading().count(), 0);
}

#[tokio::test]
async fn test_control_button_off_stops_all_fades() {
    let house = House::build(&house_config(), fast_fade());
    let spawner = CountingSpawner::default();

    house.control.control_button(
        ControlAction::Fade,
        ["lights[ub]", "lights[ur]"],
        &spawner,
    );
    let mut fading: Vec<_> = house.control.fades().fading().collect();
    fading.sort_unstable();
    assert_eq!(fading, ["ub", "ur"]);

    house
        .control
        .control_button(ControlAction::Off, std::iter::empty(), &spawner);
    assert_eq!(house.control.fades().fading().count(), 0);

    // Die Worker sehen ihr gelöschtes Flag und schreiben nichts mehr
    sleep_ms(50).await;
    let back = house.mock("192.168.0.10").values();
    assert_eq!(back.len(), 6);
    assert!(back.iter().all(|&(_, value)| value == 0));
}

#[test]
fn test_control_action_parsing() {
    assert_eq!(ControlAction::try_from("on"), Ok(ControlAction::On));
    assert_eq!(ControlAction::try_from("off"), Ok(ControlAction::Off));
    assert_eq!(ControlAction::try_from("fade"), Ok(ControlAction::Fade));
    assert!(ControlAction::try_from("o").is_err());
}
