use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use common::AppRef;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{Lifecycle, LifecycleError};
use crate::domain::{
    BindOutcome, ContentEdit, DeleteOutcome, Dependent, DependentKey, DependentKind,
};
use crate::domain::dependent::fingerprint;
use crate::utils::names;

/// Result of a content update.
#[derive(Clone, Debug, Serialize)]
pub struct DependentUpdate {
    pub dependent: Dependent,
    /// Names of the bound applications whose workloads were restarted.
    pub restarted: Vec<String>,
}

impl Lifecycle {
    #[instrument(skip(self, data, catalog_service), fields(dependent = %key))]
    pub async fn create_dependent(
        &self,
        key: DependentKey,
        catalog_service: Option<String>,
        data: BTreeMap<String, String>,
        principal: &str,
    ) -> Result<Dependent, LifecycleError> {
        names::validate_name(key.kind.as_str(), &key.name).map_err(LifecycleError::Validation)?;
        let dependent = Dependent {
            key,
            catalog_service,
            data,
            created_by: principal.to_string(),
            created_at: Utc::now(),
        };
        self.dependents.create(&dependent).await?;
        info!("Dependent created");
        Ok(dependent)
    }

    /// The dependent and the names of the applications bound to it.
    pub async fn show_dependent(
        &self,
        key: &DependentKey,
    ) -> Result<(Dependent, Vec<String>), LifecycleError> {
        let dependent = self.require_dependent(key).await?;
        let apps = self.bound_app_names(key).await?;
        Ok((dependent, apps))
    }

    pub async fn list_dependents(
        &self,
        kind: DependentKind,
        namespace: &str,
    ) -> Result<Vec<(Dependent, Vec<String>)>, LifecycleError> {
        let mut listed = Vec::new();
        for dependent in self.dependents.list(kind, namespace).await? {
            let apps = self.bound_app_names(&dependent.key).await?;
            listed.push((dependent, apps));
        }
        Ok(listed)
    }

    /// Bind each named dependent of `kind` to `app`.
    ///
    /// Returns the names that were already bound. Missing dependents are collected
    /// and reported together after the others have been bound. The workload is
    /// re-applied once when anything new was bound.
    #[instrument(skip(self), fields(app = %app, kind = %kind))]
    pub async fn bind(
        &self,
        app: &AppRef,
        kind: DependentKind,
        names: &[String],
    ) -> Result<Vec<String>, LifecycleError> {
        if names.is_empty() {
            return Err(LifecycleError::Validation(format!(
                "cannot bind {kind}s without names"
            )));
        }
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(LifecycleError::Validation(format!(
                "cannot bind {kind} with empty name"
            )));
        }
        self.require_app(app).await?;

        let unique: BTreeSet<&String> = names.iter().collect();
        let mut errors = Vec::new();
        let mut already_bound = Vec::new();
        let mut newly_bound = 0usize;

        for name in unique {
            let key = DependentKey::new(kind, app.namespace.clone(), name.clone());
            let _guard = self.lock_dependent(&key).await;

            let Some(dependent) = self.dependents.find(&key).await? else {
                errors.push(LifecycleError::not_found(kind.as_str(), name.clone()));
                continue;
            };
            match self
                .dependents
                .bind(app, &key, &dependent.fingerprint())
                .await?
            {
                BindOutcome::Bound => newly_bound += 1,
                BindOutcome::AlreadyBound => already_bound.push(name.clone()),
                BindOutcome::DependentMissing => {
                    errors.push(LifecycleError::not_found(kind.as_str(), name.clone()));
                }
            }
        }

        if newly_bound > 0 {
            self.refresh_workload(app, false).await?;
            info!(newly_bound, "Dependents bound");
        }
        LifecycleError::collect(errors)?;
        Ok(already_bound)
    }

    /// Remove the binding between `app` and a dependent. Unbinding something that
    /// is not bound succeeds without changes.
    #[instrument(skip(self), fields(app = %app, kind = %kind))]
    pub async fn unbind(
        &self,
        app: &AppRef,
        kind: DependentKind,
        name: &str,
    ) -> Result<(), LifecycleError> {
        self.require_app(app).await?;
        let key = DependentKey::new(kind, app.namespace.clone(), name);
        let _guard = self.lock_dependent(&key).await;

        self.require_dependent(&key).await?;
        if self.dependents.unbind(app, &key).await? {
            self.refresh_workload(app, false).await?;
            info!(dependent = name, "Dependent unbound");
        } else {
            debug!(dependent = name, "Not bound, nothing to unbind");
        }
        Ok(())
    }

    /// Delete a dependent.
    ///
    /// Without `cascade`, a dependent that still has bindings is refused and the
    /// bound application names are reported. With it, every binding is removed
    /// first and the affected workloads re-applied. Returns the unbound names.
    #[instrument(skip(self), fields(dependent = %key))]
    pub async fn delete_dependent(
        &self,
        key: &DependentKey,
        cascade: bool,
    ) -> Result<Vec<String>, LifecycleError> {
        let _guard = self.lock_dependent(key).await;

        let bindings = self.dependents.bindings_of(key).await?;
        if !bindings.is_empty() && !cascade {
            let mut apps: Vec<String> = bindings.into_iter().map(|b| b.app.name).collect();
            apps.sort();
            return Err(LifecycleError::BoundApplicationsExist { apps });
        }

        let mut unbound = Vec::new();
        for binding in bindings {
            if self.dependents.unbind(&binding.app, key).await? {
                self.refresh_workload(&binding.app, false).await?;
                unbound.push(binding.app.name);
            }
        }

        match self.dependents.delete_unbound(key).await? {
            DeleteOutcome::Deleted => {}
            DeleteOutcome::Missing => {
                return Err(LifecycleError::not_found(key.kind.as_str(), key.name.clone()));
            }
            DeleteOutcome::Bound(apps) => {
                return Err(LifecycleError::BoundApplicationsExist { apps });
            }
        }

        unbound.sort();
        info!(unbound = unbound.len(), "Dependent deleted");
        Ok(unbound)
    }

    /// Edit the content of a dependent and decide which bound workloads restart.
    ///
    /// `restart` forces the decision. Left unset, configurations restart bound
    /// applications only when the content fingerprint changed and services always
    /// restart them. A binding's fingerprint moves to the new content once its
    /// restart succeeded or none was due, so a failed restart is owed on the next
    /// update. Failures are collected per application after trying every binding.
    #[instrument(skip(self, edit), fields(dependent = %key))]
    pub async fn update_dependent(
        &self,
        key: &DependentKey,
        edit: &ContentEdit,
        restart: Option<bool>,
    ) -> Result<DependentUpdate, LifecycleError> {
        let _guard = self.lock_dependent(key).await;

        let current = self.require_dependent(key).await?;
        let data = edit.apply(&current.data);
        let new_fingerprint = fingerprint(&data);
        let dependent = if data == current.data {
            current
        } else {
            self.dependents.update_data(key, &data).await?
        };

        let mut restarted = Vec::new();
        let mut errors = Vec::new();
        for binding in self.dependents.bindings_of(key).await? {
            let changed = binding.fingerprint != new_fingerprint;
            let restart_app = match restart {
                Some(forced) => forced,
                None if key.kind.restarts_only_on_change() => changed,
                None => true,
            };
            if restart_app {
                match self.refresh_workload(&binding.app, true).await {
                    Ok(Some(_)) => restarted.push(binding.app.name.clone()),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(app = %binding.app, error = %e, "Restart after update failed");
                        errors.push(e);
                        continue;
                    }
                }
            }
            if changed
                && let Err(e) = self
                    .dependents
                    .set_fingerprint(&binding.app, key, &new_fingerprint)
                    .await
            {
                errors.push(e.into());
            }
        }
        LifecycleError::collect(errors)?;

        restarted.sort();
        info!(restarted = restarted.len(), "Dependent updated");
        Ok(DependentUpdate {
            dependent,
            restarted,
        })
    }

    async fn require_dependent(&self, key: &DependentKey) -> Result<Dependent, LifecycleError> {
        self.dependents
            .find(key)
            .await?
            .ok_or_else(|| LifecycleError::not_found(key.kind.as_str(), key.name.clone()))
    }

    async fn bound_app_names(&self, key: &DependentKey) -> Result<Vec<String>, LifecycleError> {
        let mut apps: Vec<String> = self
            .dependents
            .bindings_of(key)
            .await?
            .into_iter()
            .map(|b| b.app.name)
            .collect();
        apps.sort();
        Ok(apps)
    }
}
