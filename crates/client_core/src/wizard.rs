//! Client-registration wizard: holds the in-progress client while the advisor
//! moves between sections, and turns it into one create or update request.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use shared::{
    domain::ClientId,
    protocol::{ApiResponse, ClientRecord},
};
use tracing::{debug, error, info};

use crate::{
    error::ClientError,
    reference_data::{GeoCascade, GeoSelection, ReferenceData},
    sections::{SectionKey, SectionRecord},
    ApiClient,
};

/// Backend operations the wizard needs.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn fetch_client(&self, client_id: ClientId) -> Result<ClientRecord, ClientError>;
    /// Returns the backend's confirmation message.
    async fn create_client(&self, record: &ClientRecord) -> Result<String, ClientError>;
    async fn update_client(
        &self,
        client_id: ClientId,
        record: &ClientRecord,
    ) -> Result<String, ClientError>;
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

impl MutationResponse {
    fn into_result(self) -> Result<String, ClientError> {
        if self.success {
            Ok(self.message)
        } else {
            Err(ClientError::Rejected {
                message: self.message,
            })
        }
    }
}

#[async_trait]
impl ClientDirectory for ApiClient {
    async fn fetch_client(&self, client_id: ClientId) -> Result<ClientRecord, ClientError> {
        let response: ApiResponse<ClientRecord> = self
            .get_json(&format!("/asesor/cliente-id/{client_id}"), &[])
            .await?;
        match (response.success, response.data) {
            (true, Some(record)) => Ok(record),
            (_, _) => Err(ClientError::Rejected {
                message: response
                    .message
                    .unwrap_or_else(|| format!("client {client_id} was not found")),
            }),
        }
    }

    async fn create_client(&self, record: &ClientRecord) -> Result<String, ClientError> {
        let response: MutationResponse = self
            .send_json(Method::POST, "/asesor/registrar-cliente", record)
            .await?;
        response.into_result()
    }

    async fn update_client(
        &self,
        client_id: ClientId,
        record: &ClientRecord,
    ) -> Result<String, ClientError> {
        let response: MutationResponse = self
            .send_json(
                Method::PUT,
                &format!("/asesor/actualizar-cliente/{client_id}"),
                record,
            )
            .await?;
        response.into_result()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardMode {
    New,
    Edit,
}

/// What made a section report its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionTrigger {
    /// Any change in the section form (every keystroke).
    Edited,
    /// The section's explicit "save section" action.
    Saved,
}

/// Tab order plus the per-section reporting mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardLayout {
    order: Vec<SectionKey>,
    auto_emit: BTreeSet<SectionKey>,
}

impl Default for WizardLayout {
    fn default() -> Self {
        Self {
            order: SectionKey::ORDER.to_vec(),
            auto_emit: BTreeSet::from([
                SectionKey::Financial,
                SectionKey::EconomicActivity,
                SectionKey::Facta,
            ]),
        }
    }
}

impl WizardLayout {
    pub fn with_auto_emit(mut self, key: SectionKey, auto_emit: bool) -> Self {
        if auto_emit {
            self.auto_emit.insert(key);
        } else {
            self.auto_emit.remove(&key);
        }
        self
    }

    pub fn auto_emit(&self, key: SectionKey) -> bool {
        self.auto_emit.contains(&key)
    }

    pub fn order(&self) -> &[SectionKey] {
        &self.order
    }
}

#[derive(Debug, Clone)]
pub struct WizardSession {
    mode: WizardMode,
    client_id: Option<ClientId>,
    sections: BTreeMap<SectionKey, Option<SectionRecord>>,
    initial: BTreeMap<SectionKey, SectionRecord>,
    active: SectionKey,
    layout: WizardLayout,
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardSession {
    pub fn new() -> Self {
        Self::with_layout(WizardLayout::default())
    }

    pub fn with_layout(layout: WizardLayout) -> Self {
        let active = layout
            .order
            .first()
            .copied()
            .unwrap_or(SectionKey::PersonalInfo);
        Self {
            mode: WizardMode::New,
            client_id: None,
            sections: SectionKey::ORDER.into_iter().map(|key| (key, None)).collect(),
            initial: BTreeMap::new(),
            active,
            layout,
        }
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn active_section(&self) -> SectionKey {
        self.active
    }

    pub fn section_order(&self) -> &[SectionKey] {
        self.layout.order()
    }

    pub fn layout(&self) -> &WizardLayout {
        &self.layout
    }

    pub fn section(&self, key: SectionKey) -> Option<&SectionRecord> {
        self.sections.get(&key).and_then(Option::as_ref)
    }

    /// The record loaded for editing, used to prefill a section's controls.
    pub fn initial_record(&self, key: SectionKey) -> Option<&SectionRecord> {
        self.initial.get(&key)
    }

    /// Fetches an existing client and seeds every section from it.
    pub async fn load_for_edit(
        &mut self,
        directory: &dyn ClientDirectory,
        client_id: ClientId,
    ) -> Result<(), ClientError> {
        let record = directory.fetch_client(client_id).await.map_err(|err| {
            error!(client_id = client_id.0, error = %err, "wizard: failed to load client");
            err
        })?;
        self.seed(client_id, record);
        info!(
            client_id = client_id.0,
            missing = self.missing_sections().len(),
            "wizard: client loaded for edit"
        );
        Ok(())
    }

    /// Switches to edit mode with sections decomposed from `record`.
    pub fn seed(&mut self, client_id: ClientId, record: ClientRecord) {
        let sections = decompose(record);
        self.initial = sections
            .iter()
            .filter_map(|(key, record)| record.clone().map(|record| (*key, record)))
            .collect();
        self.sections = sections;
        self.mode = WizardMode::Edit;
        self.client_id = Some(client_id);
    }

    /// Replaces the section's record wholesale; fields are never merged.
    pub fn update_section(&mut self, record: SectionRecord) {
        let key = record.key();
        debug!(section = key.as_str(), "wizard: section updated");
        self.sections.insert(key, Some(record));
    }

    /// Entry point for section forms. Edits reach the aggregate only for
    /// auto-emitting sections; saves are validated first and always reach it.
    /// Returns whether the aggregate changed.
    pub fn report(
        &mut self,
        trigger: SectionTrigger,
        record: SectionRecord,
    ) -> Result<bool, ClientError> {
        let key = record.key();
        match trigger {
            SectionTrigger::Edited if !self.layout.auto_emit(key) => Ok(false),
            SectionTrigger::Edited => {
                self.update_section(record);
                Ok(true)
            }
            SectionTrigger::Saved => {
                record
                    .validate()
                    .map_err(|errors| ClientError::InvalidSection {
                        section: key,
                        errors,
                    })?;
                self.update_section(record);
                Ok(true)
            }
        }
    }

    /// Checks the contact and employment locations against reference data,
    /// adopting canonical spellings. A rewritten section must still pass its
    /// field rules; otherwise it is left as it was and the error returned.
    pub async fn reconcile_geography(
        &mut self,
        source: &dyn ReferenceData,
    ) -> Result<(), ClientError> {
        for key in [SectionKey::Contact, SectionKey::Employment] {
            let Some(section) = self.section(key).cloned() else {
                continue;
            };
            let reconciled = match section.clone() {
                SectionRecord::Contact(mut contact) => {
                    let mut cascade = GeoCascade::seeded(&GeoSelection::from(&contact));
                    cascade.refresh(source).await;
                    cascade.selection().apply_to_contact(&mut contact);
                    SectionRecord::Contact(contact)
                }
                SectionRecord::Employment(mut employment) => {
                    let mut cascade = GeoCascade::seeded(&GeoSelection::from(&employment));
                    cascade.refresh(source).await;
                    cascade.selection().apply_to_employment(&mut employment);
                    SectionRecord::Employment(employment)
                }
                other => other,
            };
            if reconciled == section {
                continue;
            }
            reconciled
                .validate()
                .map_err(|errors| ClientError::InvalidSection {
                    section: key,
                    errors,
                })?;
            debug!(section = key.as_str(), "wizard: location reconciled");
            self.sections.insert(key, Some(reconciled));
        }
        Ok(())
    }

    /// Moves to the next tab; stays put on the last one.
    pub fn advance(&mut self) {
        let order = self.layout.order();
        if let Some(index) = order.iter().position(|key| *key == self.active) {
            if let Some(next) = order.get(index + 1) {
                self.active = *next;
            }
        }
    }

    pub fn go_to(&mut self, key: SectionKey) {
        self.active = key;
    }

    /// Presence check only; field rules were enforced when sections saved.
    pub fn is_complete(&self) -> bool {
        self.sections.values().all(Option::is_some)
    }

    pub fn missing_sections(&self) -> Vec<SectionKey> {
        self.layout
            .order()
            .iter()
            .copied()
            .filter(|key| self.section(*key).is_none())
            .collect()
    }

    /// The payload the create and update endpoints expect, once complete.
    pub fn flatten(&self) -> Result<ClientRecord, ClientError> {
        if !self.is_complete() {
            return Err(ClientError::IncompleteRegistration {
                missing: self.missing_sections(),
            });
        }
        let mut record = ClientRecord::default();
        for section in self.sections.values().flatten() {
            match section.clone() {
                SectionRecord::PersonalInfo(personal) => record.personal = personal,
                SectionRecord::Contact(contact) => record.contact = Some(contact),
                SectionRecord::Employment(employment) => record.employment = Some(employment),
                SectionRecord::Financial(financial) => record.financial = Some(financial),
                SectionRecord::EconomicActivity(activity) => {
                    record.economic_activity = Some(activity)
                }
                SectionRecord::Facta(facta) => record.facta = Some(facta),
            }
        }
        Ok(record)
    }

    /// Creates (new) or updates (edit) the client. Not retried on failure.
    pub async fn submit(&self, directory: &dyn ClientDirectory) -> Result<String, ClientError> {
        let record = self.flatten()?;
        let outcome = match (self.mode, self.client_id) {
            (WizardMode::Edit, Some(client_id)) => {
                directory.update_client(client_id, &record).await
            }
            (WizardMode::Edit, None) | (WizardMode::New, _) => {
                directory.create_client(&record).await
            }
        };
        match &outcome {
            Ok(_) => info!(
                mode = ?self.mode,
                client_id = self.client_id.map(|id| id.0),
                "wizard: client submitted"
            ),
            Err(err) => error!(mode = ?self.mode, error = %err, "wizard: submit failed"),
        }
        outcome
    }
}

/// The sections present in `record`, in tab order.
pub fn split_record(record: ClientRecord) -> Vec<SectionRecord> {
    decompose(record).into_values().flatten().collect()
}

/// Splits a backend client into section records; absent nested objects stay empty.
fn decompose(record: ClientRecord) -> BTreeMap<SectionKey, Option<SectionRecord>> {
    BTreeMap::from([
        (
            SectionKey::PersonalInfo,
            Some(SectionRecord::PersonalInfo(record.personal)),
        ),
        (
            SectionKey::Contact,
            record.contact.map(SectionRecord::Contact),
        ),
        (
            SectionKey::Employment,
            record.employment.map(SectionRecord::Employment),
        ),
        (
            SectionKey::Financial,
            record.financial.map(SectionRecord::Financial),
        ),
        (
            SectionKey::EconomicActivity,
            record.economic_activity.map(SectionRecord::EconomicActivity),
        ),
        (SectionKey::Facta, record.facta.map(SectionRecord::Facta)),
    ])
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
