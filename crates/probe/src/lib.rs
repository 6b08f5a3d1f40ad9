//! Number Racing browser test harness
//!
//! Drives the deployed Number Racing games in a real browser and records
//! what a human would otherwise check by hand: white screens, broken
//! navigation, missing icons, stuck loading indicators.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ScenarioRunner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  DriverFactory::launch() -> Box<dyn PageDriver>             │
//! │    ├── PlaywrightDriver (Node bridge, JSON lines)           │
//! │    └── FakePage (in-memory, tests)                          │
//! │  Session                                                    │
//! │    ├── open / goto / reload        (bootstrapper)           │
//! │    ├── poll_until(Condition)       (condition poller)       │
//! │    ├── click / force_click         (action dispatcher)      │
//! │    ├── screenshot / report_tail    (evidence collector)     │
//! │    └── ObservationLog              (console, page errors)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario                                                   │
//! │    ├── built-in: navigation, first-task, pause, ...         │
//! │    └── ScenarioSpec (YAML steps)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod checks;
pub mod condition;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod fake;
pub mod game;
pub mod locator;
pub mod observe;
pub mod playwright;
pub mod poll;
pub mod runner;
pub mod scenarios;
pub mod session;
pub mod spec;

pub use api::{GameApi, Profile, ProfileId};
pub use checks::{Check, CheckStatus, Checklist};
pub use condition::Condition;
pub use config::HarnessConfig;
pub use driver::{DriverFactory, PageDriver};
pub use error::{E2eError, E2eResult};
pub use locator::Locator;
pub use playwright::{PlaywrightConfig, PlaywrightLauncher};
pub use poll::{PollOutcome, Poller};
pub use runner::{RunnerConfig, ScenarioResult, ScenarioRunner, SuiteResult};
pub use scenarios::Scenario;
pub use session::{Phase, Session, SessionConfig};
pub use spec::ScenarioSpec;
