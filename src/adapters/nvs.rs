//! NVS (Non-Volatile Storage) configuration adapter.
//!
//! Implements [`ConfigPort`]: the [`SystemConfig`] is stored as a single
//! postcard blob under `airnode/syscfg`. Values are validated on save and
//! again on load, so a blob written by an older firmware with out-of-range
//! values falls back to defaults instead of reaching the driver.
//!
//! ESP-IDF NVS commits are atomic per `nvs_commit()`. The host backend
//! keeps the blob in memory.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"airnode\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"syscfg\0";

const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    blob: Option<Vec<u8>>,
}

fn validate(cfg: &SystemConfig) -> Result<(), ConfigError> {
    cfg.validate().map_err(|e| match e {
        crate::error::Error::Config(msg) => ConfigError::ValidationFailed(msg),
        _ => ConfigError::ValidationFailed("config"),
    })
}

fn decode(bytes: &[u8]) -> Result<SystemConfig, ConfigError> {
    let cfg: SystemConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
    validate(&cfg)?;
    Ok(cfg)
}

impl NvsConfigStore {
    /// Initialise NVS flash. On a full or outdated partition the flash is
    /// erased and initialised again.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, ConfigError> {
        // SAFETY: called once from the main task before any other NVS use.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK as i32 || unsafe { nvs_flash_init() } != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
        } else if ret != ESP_OK as i32 {
            return Err(ConfigError::IoError);
        }
        info!("NVS: initialised");
        Ok(Self {})
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NVS: simulation backend");
        Ok(Self { blob: None })
    }

    /// Open the config namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Option<Vec<u8>>, i32> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(Some(buf)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Option<Vec<u8>> {
        self.blob.clone()
    }
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(target_os = "espidf")]
        let stored = Self::read_blob().unwrap_or_else(|e| {
            warn!("NVS: read error {}, using defaults", e);
            None
        });
        #[cfg(not(target_os = "espidf"))]
        let stored = self.read_blob();

        let Some(bytes) = stored else {
            info!("NVS: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        match decode(&bytes) {
            Ok(cfg) => {
                info!("NVS: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(e) => {
                warn!("NVS: stored config rejected ({}), using defaults", e);
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY.as_ptr().cast(),
                        bytes.as_ptr().cast(),
                        bytes.len(),
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            if let Err(e) = result {
                warn!("NVS: write error {}", e);
                return Err(ConfigError::IoError);
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.blob = Some(bytes.clone());
        }

        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
