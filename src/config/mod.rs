//! # Configuration
//!
//! Settings are layered, later sources winning:
//! built-in defaults, `config/default.toml`, `config/{RUN_ENV}.toml`,
//! `APP__SECTION__KEY` environment variables, then the plain overrides
//! `SERVER_HOST`, `SERVER_PORT`, `DATABASE_URL` and `JWT_SECRET`.
//! A `.env` file is read first when present.
//!
//! ```rust,ignore
//! use chatpulse::config::Settings;
//!
//! let settings = Settings::load()?;
//! tracing::info!(addr = %settings.server_addr(), "Binding");
//! ```

mod settings;

pub use settings::*;
