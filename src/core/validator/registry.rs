//! Maps protocol IDs to the requirements that apply to them

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::rules::{RequirementDef, RuleFile};
use super::{ProtocolRequirement, RequirementValidator, Validator};
use crate::error::ConfigError;

/// Built-in EDRN rules: core requirements plus MR modality requirements
pub const BUILTIN_RULES: &str = include_str!("../../../rules/edrn.toml");

pub const DEFAULT_PROTOCOL: u32 = 430;

#[derive(Debug, Clone)]
struct Protocol {
    name: String,
    modalities: Vec<String>,
    requirements: Vec<ProtocolRequirement>,
}

/// Summary of a protocol for listing
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolInfo {
    pub id: u32,
    pub name: String,
    pub modalities: Vec<String>,
    pub requirements: usize,
}

#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    core: Vec<ProtocolRequirement>,
    protocols: BTreeMap<u32, Protocol>,
    modalities: BTreeMap<String, Vec<ProtocolRequirement>>,
}

fn compile_all(
    defs: &[RequirementDef],
    modality: Option<&str>,
) -> Result<Vec<ProtocolRequirement>, ConfigError> {
    defs.iter().map(|def| def.compile(modality)).collect()
}

impl ValidatorRegistry {
    /// Parse and compile a rule file; every problem is reported here, before any file is scanned
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = toml::from_str(text)?;

        let core = compile_all(&file.core, None)?;

        let mut protocols = BTreeMap::new();
        for (key, def) in &file.protocols {
            let id: u32 = key
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidProtocolKey(key.clone()))?;
            protocols.insert(
                id,
                Protocol {
                    name: def.name.clone(),
                    modalities: def.modalities.clone(),
                    requirements: compile_all(&def.requirements, None)?,
                },
            );
        }

        let mut modalities = BTreeMap::new();
        for (modality, defs) in &file.modalities {
            modalities.insert(modality.clone(), compile_all(defs, Some(modality))?);
        }

        Ok(Self {
            core,
            protocols,
            modalities,
        })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml(BUILTIN_RULES)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::RuleFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Requirements for `protocol_id`: core, then protocol, then modality
    ///
    /// A later requirement with the same name replaces an earlier one in place.
    pub fn resolve(&self, protocol_id: u32) -> Result<Vec<ProtocolRequirement>, ConfigError> {
        let protocol = self
            .protocols
            .get(&protocol_id)
            .ok_or(ConfigError::UnknownProtocol(protocol_id))?;

        let modality_requirements = protocol
            .modalities
            .iter()
            .filter_map(|m| self.modalities.get(m))
            .flatten();

        let mut merged: IndexMap<String, ProtocolRequirement> = IndexMap::new();
        for requirement in self
            .core
            .iter()
            .chain(&protocol.requirements)
            .chain(modality_requirements)
        {
            merged.insert(requirement.name.clone(), requirement.clone());
        }

        tracing::debug!(
            protocol = protocol_id,
            name = %protocol.name,
            requirements = merged.len(),
            "Resolved protocol requirements"
        );
        Ok(merged.into_values().collect())
    }

    /// One validator per resolved requirement
    pub fn validators_for(&self, protocol_id: u32) -> Result<Vec<Box<dyn Validator>>, ConfigError> {
        Ok(self
            .resolve(protocol_id)?
            .into_iter()
            .map(|r| Box::new(RequirementValidator::new(r)) as Box<dyn Validator>)
            .collect())
    }

    pub fn protocols(&self) -> Vec<ProtocolInfo> {
        self.protocols
            .keys()
            .filter_map(|&id| {
                let protocol = &self.protocols[&id];
                let requirements = self.resolve(id).ok()?.len();
                Some(ProtocolInfo {
                    id,
                    name: protocol.name.clone(),
                    modalities: protocol.modalities.clone(),
                    requirements,
                })
            })
            .collect()
    }
}
