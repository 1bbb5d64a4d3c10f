mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Postgres, Service, Storage, Taggable};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for taggable in &cfg.taggables {
		if taggable.type_name.is_empty() {
			return Err(Error::Validation {
				message: "taggables.type_name must be non-empty.".to_string(),
			});
		}
		if !seen.insert(taggable.type_name.as_str()) {
			return Err(Error::Validation {
				message: format!("taggables.type_name {:?} is declared twice.", taggable.type_name),
			});
		}
		if taggable.table.is_empty() {
			return Err(Error::Validation {
				message: format!("taggables.table must be non-empty for {}.", taggable.type_name),
			});
		}
		if !taggable.columns.iter().any(|column| column == &taggable.primary_key) {
			return Err(Error::Validation {
				message: format!(
					"taggables.columns for {} must include the primary key {:?}.",
					taggable.type_name, taggable.primary_key
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	for taggable in &mut cfg.taggables {
		taggable.type_name = taggable.type_name.trim().to_string();
		taggable.table = taggable.table.trim().to_string();
		taggable.primary_key = taggable.primary_key.trim().to_string();

		for column in &mut taggable.columns {
			*column = column.trim().to_string();
		}

		let mut seen = HashSet::new();

		taggable.contexts = taggable
			.contexts
			.iter()
			.map(|context| context.trim().to_string())
			.filter(|context| !context.is_empty() && seen.insert(context.clone()))
			.collect();
	}
}
