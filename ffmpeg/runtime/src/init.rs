/*!
    Process-wide FFmpeg initialization.

    The first call to [`init`] performs the global setup; later calls are
    no-ops. An application that sets FFmpeg up itself calls
    [`set_initialized_externally`] first, which suppresses both the setup
    and the teardown performed by [`shutdown`].
*/

use ffmpeg_next::util::log;
use parking_lot::{Mutex, const_mutex};

use videoio_types::{Error, ErrorKind, Result};

/**
    Verbosity of FFmpeg's own logging.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Panic,
    Fatal,
    #[default]
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_ffmpeg(self) -> log::Level {
        match self {
            Self::Quiet => log::Level::Quiet,
            Self::Panic => log::Level::Panic,
            Self::Fatal => log::Level::Fatal,
            Self::Error => log::Level::Error,
            Self::Warning => log::Level::Warning,
            Self::Info => log::Level::Info,
            Self::Verbose => log::Level::Verbose,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

/**
    Options applied by the one-time setup.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// FFmpeg log verbosity.
    pub log_level: LogLevel,
    /// Enable network protocols.
    pub network: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Error,
            network: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_network(mut self, network: bool) -> Self {
        self.network = network;
        self
    }
}

/**
    Who, if anyone, owns the FFmpeg setup.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    /// Set up by this crate; [`shutdown`] tears it down.
    Owned { network: bool },
    /// Set up by the application; never touched here.
    External,
    /// Torn down by [`shutdown`]; [`init`] may set it up again.
    ShutDown,
}

impl RuntimeState {
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Owned { .. } | Self::External)
    }
}

struct Registry {
    state: Mutex<RuntimeState>,
}

impl Registry {
    const fn new() -> Self {
        Self {
            state: const_mutex(RuntimeState::Uninitialized),
        }
    }

    fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    fn init_with<S>(&self, config: RuntimeConfig, setup: S) -> Result<()>
    where
        S: FnOnce(&RuntimeConfig) -> Result<()>,
    {
        let mut state = self.state.lock();
        if state.is_initialized() {
            return Ok(());
        }
        setup(&config)?;
        *state = RuntimeState::Owned {
            network: config.network,
        };
        Ok(())
    }

    fn set_external(&self, flag: bool) -> Result<()> {
        let mut state = self.state.lock();
        if let RuntimeState::Owned { .. } = *state {
            return Err(Error::bad_param(
                "FFmpeg was already initialized by this process",
            ));
        }
        *state = if flag {
            RuntimeState::External
        } else {
            RuntimeState::Uninitialized
        };
        Ok(())
    }

    fn shutdown<T>(&self, teardown: T)
    where
        T: FnOnce(bool),
    {
        let mut state = self.state.lock();
        if let RuntimeState::Owned { network } = *state {
            teardown(network);
            *state = RuntimeState::ShutDown;
        }
    }
}

static REGISTRY: Registry = Registry::new();

/**
    Initialize FFmpeg with the default configuration.

    Safe to call any number of times from any thread.
*/
pub fn init() -> Result<()> {
    init_with(RuntimeConfig::default())
}

/**
    Initialize FFmpeg with the given configuration.

    Only the first effective call applies its configuration.
*/
pub fn init_with(config: RuntimeConfig) -> Result<()> {
    REGISTRY.init_with(config, |config| {
        ffmpeg_next::init().map_err(|e| {
            crate::error::from_ffmpeg(ErrorKind::OpenCodec, "initializing FFmpeg", e)
        })?;
        if config.network {
            ffmpeg_next::format::network::init();
        }
        log::set_level(config.log_level.to_ffmpeg());
        tracing::debug!(?config, "FFmpeg runtime initialized");
        Ok(())
    })
}

/**
    Declare that the application initializes FFmpeg itself.

    With `true`, [`init`] and [`shutdown`] become no-ops. With `false`, the
    declaration is withdrawn. Fails with `BadParam` if this crate already
    performed the initialization.
*/
pub fn set_initialized_externally(flag: bool) -> Result<()> {
    REGISTRY.set_external(flag)
}

/**
    Undo the global setup, if this crate performed it.
*/
pub fn shutdown() {
    REGISTRY.shutdown(|network| {
        if network {
            ffmpeg_next::format::network::deinit();
        }
        tracing::debug!("FFmpeg runtime shut down");
    });
}

pub fn state() -> RuntimeState {
    REGISTRY.state()
}

pub fn is_initialized() -> bool {
    REGISTRY.state().is_initialized()
}

/**
    Codec thread count for a requested value.

    `None` or zero means one thread per logical CPU plus one.
*/
pub fn thread_count(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .unwrap_or_else(|| num_cpus::get() + 1)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn thread_count_defaults_to_cpus_plus_one() {
        assert_eq!(thread_count(Some(3)), 3);
        assert_eq!(thread_count(None), num_cpus::get() + 1);
        assert_eq!(thread_count(Some(0)), num_cpus::get() + 1);
    }

    #[test]
    fn init_runs_setup_once() {
        let registry = Registry::new();
        let calls = Cell::new(0);
        for _ in 0..3 {
            registry
                .init_with(RuntimeConfig::default(), |_| {
                    calls.set(calls.get() + 1);
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.state(), RuntimeState::Owned { network: true });
    }

    #[test]
    fn failed_setup_can_be_retried() {
        let registry = Registry::new();
        let result = registry.init_with(RuntimeConfig::default(), |_| {
            Err(Error::new(ErrorKind::OpenCodec, "no"))
        });
        assert!(result.is_err());
        assert_eq!(registry.state(), RuntimeState::Uninitialized);

        registry
            .init_with(RuntimeConfig::default(), |_| Ok(()))
            .unwrap();
        assert!(registry.state().is_initialized());
    }

    #[test]
    fn external_init_suppresses_setup_and_teardown() {
        let registry = Registry::new();
        registry.set_external(true).unwrap();

        let mut setup_ran = false;
        registry
            .init_with(RuntimeConfig::default(), |_| {
                setup_ran = true;
                Ok(())
            })
            .unwrap();
        assert!(!setup_ran);

        let mut teardown_ran = false;
        registry.shutdown(|_| teardown_ran = true);
        assert!(!teardown_ran);
        assert_eq!(registry.state(), RuntimeState::External);
    }

    #[test]
    fn external_flag_rejected_after_own_init() {
        let registry = Registry::new();
        registry
            .init_with(RuntimeConfig::default(), |_| Ok(()))
            .unwrap();
        let err = registry.set_external(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParam);
    }

    #[test]
    fn teardown_runs_once_with_network_flag() {
        let registry = Registry::new();
        registry
            .init_with(RuntimeConfig::default().with_network(false), |_| Ok(()))
            .unwrap();

        let mut seen = Vec::new();
        registry.shutdown(|network| seen.push(network));
        registry.shutdown(|network| seen.push(network));
        assert_eq!(seen, vec![false]);
        assert_eq!(registry.state(), RuntimeState::ShutDown);
    }

    #[test]
    fn global_init_is_idempotent() {
        init().unwrap();
        init().unwrap();
        assert!(is_initialized());
    }
}
