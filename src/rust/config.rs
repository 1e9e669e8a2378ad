// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    device::{
        topology::EngineTopology,
        DeviceOptions,
    },
    fail::Fail,
    types::{
        EngineType,
        HwPriority,
    },
};
use ::std::{
    fs,
    ops::Index,
    str::FromStr,
    time::Duration,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Context manager options. These apply to every context of a device.
mod accelctx_config {
    pub const SECTION_NAME: &str = "accelctx";
    pub const JOB_QUEUE_DEPTH: &str = "job_queue_depth";
    pub const FLUSH_TIMEOUT_MS: &str = "flush_timeout_ms";
    pub const TRUSTED_GROUP: &str = "trusted_group";
}

// Device description.
mod device_config {
    pub const SECTION_NAME: &str = "device";
    // Mid-command-buffer preemption.
    pub const MCBP: &str = "mcbp";
    pub const ACE_TUNNEL: &str = "ace_tunnel";
    pub const RINGS: &str = "rings";
    pub const RING_NAME: &str = "name";
    pub const RING_HW_PRIO: &str = "hw_prio";
    pub const RING_READY: &str = "ready";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Context manager configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let config_s: String = match fs::read_to_string(config_path) {
            Ok(s) => s,
            Err(e) => {
                error!("new(): failed to read configuration file (path={:?}, error={:?})", config_path, e);
                return Err(e.into());
            },
        };
        config_s.parse()
    }

    fn get_accelctx_config(&self) -> Result<&Yaml, Fail> {
        Self::get_subsection(&self.0, accelctx_config::SECTION_NAME)
    }

    fn get_device_config(&self) -> Result<&Yaml, Fail> {
        Self::get_subsection(&self.0, device_config::SECTION_NAME)
    }

    /// Reads the number of in-flight jobs tracked per entity from the environment variable first and then the
    /// underlying configuration file.
    pub fn job_queue_depth(&self) -> Result<usize, Fail> {
        let depth: usize = if let Some(depth) = Self::get_typed_env_option(accelctx_config::JOB_QUEUE_DEPTH)? {
            depth
        } else {
            Self::get_int_option(self.get_accelctx_config()?, accelctx_config::JOB_QUEUE_DEPTH)?
        };

        if !depth.is_power_of_two() {
            let cause: String = format!("job queue depth must be a power of two (depth={:?})", depth);
            error!("job_queue_depth(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        Ok(depth)
    }

    /// Reads the teardown flush budget from the environment variable first and then the underlying configuration
    /// file.
    pub fn flush_timeout(&self) -> Result<Duration, Fail> {
        let millis: u64 = if let Some(millis) = Self::get_typed_env_option(accelctx_config::FLUSH_TIMEOUT_MS)? {
            millis
        } else {
            Self::get_int_option(self.get_accelctx_config()?, accelctx_config::FLUSH_TIMEOUT_MS)?
        };
        Ok(Duration::from_millis(millis))
    }

    /// Reads the group whose members may create elevated contexts. Returns None when there is no such group.
    pub fn trusted_group(&self) -> Result<Option<u32>, Fail> {
        if let Some(group) = Self::get_typed_env_option(accelctx_config::TRUSTED_GROUP)? {
            return Ok(Some(group));
        }
        match self.get_accelctx_config()?.index(accelctx_config::TRUSTED_GROUP) {
            Yaml::BadValue | Yaml::Null => Ok(None),
            _ => Ok(Some(Self::get_int_option(
                self.get_accelctx_config()?,
                accelctx_config::TRUSTED_GROUP,
            )?)),
        }
    }

    /// Reads the setting to enable or disable mid-command-buffer preemption.
    pub fn mcbp(&self) -> Result<bool, Fail> {
        if let Some(mcbp) = Self::get_typed_env_option(device_config::MCBP)? {
            Ok(mcbp)
        } else {
            Self::get_bool_option(self.get_device_config()?, device_config::MCBP)
        }
    }

    /// Reads the setting to reserve the last compute queue for the ACE tunnel.
    pub fn ace_tunnel(&self) -> Result<bool, Fail> {
        if let Some(ace_tunnel) = Self::get_typed_env_option(device_config::ACE_TUNNEL)? {
            Ok(ace_tunnel)
        } else {
            Self::get_bool_option(self.get_device_config()?, device_config::ACE_TUNNEL)
        }
    }

    /// Builds the device options. These cannot be passed in as a whole through the environment, but every field
    /// can be overridden on its own.
    pub fn device_options(&self) -> Result<DeviceOptions, Fail> {
        Ok(DeviceOptions {
            job_queue_depth: self.job_queue_depth()?,
            flush_timeout: self.flush_timeout()?,
            trusted_group: self.trusted_group()?,
        })
    }

    /// Builds the engine topology from the "rings" subsection. Queues of one engine type get consecutive back end
    /// identifiers, in file order, and engine types are numbered in their canonical order.
    pub fn topology(&self) -> Result<EngineTopology, Fail> {
        let rings: &Yaml = Self::get_subsection(self.get_device_config()?, device_config::RINGS)?;
        let mut engines: Vec<(EngineType, &Yaml)> = Vec::new();
        if let Some(hash) = rings.as_hash() {
            for (key, value) in hash {
                let engine: EngineType = match key.as_str() {
                    Some(name) => name.parse()?,
                    None => {
                        let cause: String = format!("engine type names must be strings (key={:?})", key);
                        error!("topology(): {}", cause);
                        return Err(Fail::new(libc::EINVAL, &cause));
                    },
                };
                engines.push((engine, value));
            }
        }
        engines.sort_by_key(|(engine, _)| engine.index());

        let mut topology: EngineTopology = EngineTopology::default();
        for (engine, descs) in engines {
            let descs: &Vec<Yaml> = match descs.as_vec() {
                Some(descs) => descs,
                None => {
                    let cause: String = format!("queues of an engine type must be a list (engine={})", engine);
                    error!("topology(): {}", cause);
                    return Err(Fail::new(libc::EINVAL, &cause));
                },
            };
            for desc in descs {
                let name: &str = Self::get_typed_option(desc, device_config::RING_NAME, &Yaml::as_str)?;
                let hw_prio: HwPriority = match desc.index(device_config::RING_HW_PRIO) {
                    Yaml::BadValue => HwPriority::default(),
                    _ => Self::get_typed_str_option(desc, device_config::RING_HW_PRIO, |val: &str| match val {
                        "normal" => Some(HwPriority::Normal),
                        "high" => Some(HwPriority::High),
                        _ => None,
                    })?,
                };
                let ready: bool = match desc.index(device_config::RING_READY) {
                    Yaml::BadValue => true,
                    _ => Self::get_bool_option(desc, device_config::RING_READY)?,
                };
                topology.add_ring(engine, name, hw_prio, ready);
            }
        }

        topology.set_mcbp(self.mcbp()?);
        topology.set_ace_tunnel(self.ace_tunnel()?)?;
        Ok(topology)
    }

    //======================================================================================================================
    // Static Functions
    //======================================================================================================================

    /// Similar to `get_typed_option` using `Yaml::as_hash` receiver. This method returns a `&Yaml` instead of
    /// yaml::Hash, and Yaml is more natural for indexing.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        let section: &'a Yaml = Self::get_option(yaml, index)?;
        match section {
            Yaml::Hash(_) => Ok(section),
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            Yaml::BadValue => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
            value => Ok(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }

    /// Same as `Self::get_typed_option` using `Yaml::as_bool` as the receiver.
    fn get_bool_option(yaml: &Yaml, index: &str) -> Result<bool, Fail> {
        Self::get_typed_option(yaml, index, &Yaml::as_bool)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for Config {
    type Err = Fail;

    /// Parses a configuration document.
    fn from_str(config_s: &str) -> Result<Self, Self::Err> {
        let config: Vec<Yaml> = YamlLoader::load_from_str(config_s)?;
        let config_obj: &Yaml = match &config[..] {
            &[ref c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
