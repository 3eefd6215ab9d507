//! Per-type policy registry
//!
//! The registry maps an entity type identifier to its [`DuplicationPolicy`].
//! Policies are created lazily, either on first configuration or the first
//! time a duplication asks for them, and are handed out as `Arc` snapshots:
//! reconfiguring a type replaces its snapshot and never affects a duplication
//! that is already running.
//!
//! [`PolicyRegistry::effective_policy`] adds the settings that ancestor types
//! propagate, following the hierarchy the [`Host`] reports.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::config;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::policy::{DuplicationPolicy, PolicyBuilder};

type PolicyMap<H> = HashMap<String, Arc<DuplicationPolicy<H>>>;

/// Shared store of duplication policies keyed by entity type
pub struct PolicyRegistry<H: Host> {
    policies: Arc<Mutex<PolicyMap<H>>>,
}

impl<H: Host> Clone for PolicyRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            policies: Arc::clone(&self.policies),
        }
    }
}

impl<H: Host> Default for PolicyRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> std::fmt::Debug for PolicyRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types = self.entity_types().unwrap_or_default();
        types.sort();
        f.debug_struct("PolicyRegistry")
            .field("entity_types", &types)
            .finish()
    }
}

impl<H: Host> PolicyRegistry<H> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            policies: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PolicyMap<H>>> {
        self.policies.lock().map_err(|_| Error::LockPoisoned {
            context: "policy registry".to_string(),
        })
    }

    /// Configure the policy of `entity_type` through a builder.
    ///
    /// The closure works on a copy of the current policy; the copy is
    /// validated and only then published, so a rejected configuration leaves
    /// the previous policy in place. The registry is not locked while the
    /// closure runs, so it may read other policies from this registry.
    pub fn configure<F>(&self, entity_type: &str, configure: F) -> Result<()>
    where
        F: FnOnce(&mut PolicyBuilder<'_, H>),
    {
        let mut policy = self
            .lock()?
            .get(entity_type)
            .map(|current| DuplicationPolicy::clone(current))
            .unwrap_or_default();

        configure(&mut policy.builder());
        policy.validate(entity_type)?;

        debug!("configured duplication policy for {}: {:?}", entity_type, policy);
        self.lock()?
            .insert(entity_type.to_string(), Arc::new(policy));
        Ok(())
    }

    /// Install a complete policy for `entity_type`, replacing any existing one
    pub fn insert(&self, entity_type: &str, policy: DuplicationPolicy<H>) -> Result<()> {
        policy.validate(entity_type)?;
        self.lock()?
            .insert(entity_type.to_string(), Arc::new(policy));
        Ok(())
    }

    /// Snapshot of the policy for `entity_type`, created empty if missing
    pub fn policy_for(&self, entity_type: &str) -> Result<Arc<DuplicationPolicy<H>>> {
        let mut policies = self.lock()?;
        let policy = policies
            .entry(entity_type.to_string())
            .or_insert_with(|| Arc::new(DuplicationPolicy::default()));
        Ok(Arc::clone(policy))
    }

    /// The policy `entity_type` is duplicated with: its own policy layered
    /// with whatever its ancestor types propagate.
    ///
    /// Ancestors are folded from the root down, so a grandparent's settings
    /// reach a grandchild through the parent even when the parent has no
    /// policy of its own.
    pub fn effective_policy(&self, host: &H, entity_type: &str) -> Result<Arc<DuplicationPolicy<H>>> {
        let own = self.policy_for(entity_type)?;

        let mut ancestors: Vec<String> = Vec::new();
        let mut current = entity_type.to_string();
        while let Some(parent) = host.parent_type(&current)? {
            let looped = parent == entity_type || ancestors.contains(&parent);
            ancestors.push(parent.clone());
            if looped {
                return Err(Error::Host {
                    message: format!(
                        "type hierarchy loops: {} -> {}",
                        entity_type,
                        ancestors.join(" -> ")
                    ),
                });
            }
            current = parent;
        }

        let mut inherited: Option<DuplicationPolicy<H>> = None;
        for ancestor in ancestors.iter().rev() {
            let policy = self
                .get(ancestor)?
                .map(|policy| DuplicationPolicy::clone(&policy))
                .unwrap_or_default();
            inherited = Some(match inherited {
                Some(parent) => policy.inherited_from(&parent),
                None => policy,
            });
        }

        match inherited {
            Some(parent) if parent.parenting().is_some() => {
                debug!(
                    "{} inherits duplication settings from {}",
                    entity_type,
                    ancestors.join(" -> ")
                );
                Ok(Arc::new(own.inherited_from(&parent)))
            }
            _ => Ok(own),
        }
    }

    /// Snapshot of the policy for `entity_type` without creating one
    pub fn get(&self, entity_type: &str) -> Result<Option<Arc<DuplicationPolicy<H>>>> {
        Ok(self.lock()?.get(entity_type).cloned())
    }

    /// Check if a policy exists for `entity_type`
    pub fn contains(&self, entity_type: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(entity_type))
    }

    /// Entity types that currently have a policy, in no particular order
    pub fn entity_types(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    /// Remove the policy of `entity_type`, returning it if present
    pub fn remove(&self, entity_type: &str) -> Result<Option<Arc<DuplicationPolicy<H>>>> {
        Ok(self.lock()?.remove(entity_type))
    }

    /// Clear all policies
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Get the number of registered policies
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Apply a YAML policy document; see [`config`](crate::config).
    pub fn load_yaml(&self, yaml_content: &str) -> Result<()> {
        let document = config::parse(yaml_content)?;
        for (entity_type, settings) in &document {
            self.configure(entity_type, |builder| settings.apply(builder))?;
        }
        Ok(())
    }

    /// Read and apply a YAML policy document from disk
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.load_yaml(&content)
    }
}
