//! Country → department → city selects fed by asynchronously loaded
//! reference data.
//!
//! Each level is a small state machine (`Unloaded → Loading → Ready`). A value
//! that arrives before its options are `Ready` is held as a deferred patch and
//! only checked against the options once the single read has completed, so a
//! section re-opened in edit mode never loses values it already had.

use async_trait::async_trait;
use shared::protocol::{Contact, Employment, ReferenceOptionsResponse};
use tracing::{debug, warn};

use crate::{error::ClientError, ApiClient};

#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn countries(&self) -> Result<Vec<String>, ClientError>;
    async fn departments(&self, country: &str) -> Result<Vec<String>, ClientError>;
    async fn cities(&self, country: &str, department: &str) -> Result<Vec<String>, ClientError>;
}

#[async_trait]
impl ReferenceData for ApiClient {
    async fn countries(&self) -> Result<Vec<String>, ClientError> {
        let response: ReferenceOptionsResponse =
            self.get_json("/referencia/paises", &[]).await?;
        Ok(response.data)
    }

    async fn departments(&self, country: &str) -> Result<Vec<String>, ClientError> {
        let response: ReferenceOptionsResponse = self
            .get_json("/referencia/departamentos", &[("pais", country)])
            .await?;
        Ok(response.data)
    }

    async fn cities(&self, country: &str, department: &str) -> Result<Vec<String>, ClientError> {
        let response: ReferenceOptionsResponse = self
            .get_json(
                "/referencia/ciudades",
                &[("pais", country), ("departamento", department)],
            )
            .await?;
        Ok(response.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Ready(Vec<String>),
}

/// One select whose options depend on a parent's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependentField {
    state: LoadState,
    value: String,
    deferred: Option<String>,
}

impl DependentField {
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    pub fn options(&self) -> &[String] {
        match &self.state {
            LoadState::Ready(options) => options,
            LoadState::Unloaded | LoadState::Loading => &[],
        }
    }

    /// The value the section should report: a pending patch wins over the
    /// applied value until the options are ready.
    pub fn value(&self) -> &str {
        self.deferred.as_deref().unwrap_or(&self.value)
    }

    pub fn has_deferred_patch(&self) -> bool {
        self.deferred.is_some()
    }

    /// Sets a value, deferring it while options are not ready yet.
    pub fn patch(&mut self, value: impl Into<String>) {
        let value = value.into();
        if self.is_ready() {
            self.apply(value);
        } else {
            self.deferred = Some(value);
        }
    }

    fn begin_load(&mut self) {
        if self.deferred.is_none() && !self.value.is_empty() {
            self.deferred = Some(std::mem::take(&mut self.value));
        }
        self.state = LoadState::Loading;
    }

    fn finish_load(&mut self, options: Vec<String>) {
        self.state = LoadState::Ready(options);
        if let Some(value) = self.deferred.take() {
            self.apply(value);
        }
    }

    /// Only called once options are ready. An empty option set means the
    /// lookup degraded, so the value is kept as typed.
    fn apply(&mut self, value: String) {
        let options: &[String] = match &self.state {
            LoadState::Ready(options) => options,
            LoadState::Unloaded | LoadState::Loading => &[],
        };
        if value.is_empty() || options.is_empty() {
            self.value = value;
            return;
        }
        let wanted = value.trim().to_lowercase();
        match options
            .iter()
            .find(|option| option.to_lowercase() == wanted)
        {
            Some(canonical) => self.value = canonical.clone(),
            None => {
                debug!(value = %value, "reference: value not among loaded options; cleared");
                self.value.clear();
            }
        }
    }

    fn reset(&mut self) {
        *self = DependentField::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoLevel {
    Country,
    Department,
    City,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoSelection {
    pub country: String,
    pub department: String,
    pub city: String,
}

impl From<&Contact> for GeoSelection {
    fn from(contact: &Contact) -> Self {
        Self {
            country: contact.country.clone(),
            department: contact.department.clone(),
            city: contact.city.clone(),
        }
    }
}

impl From<&Employment> for GeoSelection {
    fn from(employment: &Employment) -> Self {
        Self {
            country: employment.company_country.clone(),
            department: employment.company_department.clone(),
            city: employment.company_city.clone(),
        }
    }
}

impl GeoSelection {
    pub fn apply_to_contact(&self, contact: &mut Contact) {
        contact.country = self.country.clone();
        contact.department = self.department.clone();
        contact.city = self.city.clone();
    }

    pub fn apply_to_employment(&self, employment: &mut Employment) {
        employment.company_country = self.country.clone();
        employment.company_department = self.department.clone();
        employment.company_city = self.city.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoCascade {
    country: DependentField,
    department: DependentField,
    city: DependentField,
}

impl GeoCascade {
    /// A cascade whose every level starts with a deferred patch.
    pub fn seeded(selection: &GeoSelection) -> Self {
        let mut cascade = Self::default();
        for (level, value) in [
            (GeoLevel::Country, &selection.country),
            (GeoLevel::Department, &selection.department),
            (GeoLevel::City, &selection.city),
        ] {
            if !value.is_empty() {
                cascade.field_mut(level).patch(value.clone());
            }
        }
        cascade
    }

    pub fn field(&self, level: GeoLevel) -> &DependentField {
        match level {
            GeoLevel::Country => &self.country,
            GeoLevel::Department => &self.department,
            GeoLevel::City => &self.city,
        }
    }

    fn field_mut(&mut self, level: GeoLevel) -> &mut DependentField {
        match level {
            GeoLevel::Country => &mut self.country,
            GeoLevel::Department => &mut self.department,
            GeoLevel::City => &mut self.city,
        }
    }

    pub fn selection(&self) -> GeoSelection {
        GeoSelection {
            country: self.country.value().to_string(),
            department: self.department.value().to_string(),
            city: self.city.value().to_string(),
        }
    }

    /// A user choice: sets the level and resets every level below it.
    pub fn select(&mut self, level: GeoLevel, value: impl Into<String>) {
        self.field_mut(level).patch(value);
        self.reset_below(level);
    }

    pub fn begin_load(&mut self, level: GeoLevel) {
        self.field_mut(level).begin_load();
    }

    /// Completes a load. Failures degrade to an empty option set and keep
    /// whatever value was pending.
    pub fn finish_load(&mut self, level: GeoLevel, result: Result<Vec<String>, ClientError>) {
        let options = result.unwrap_or_else(|error| {
            warn!(?level, %error, "reference: lookup failed; continuing without options");
            Vec::new()
        });
        self.field_mut(level).finish_load(options);
    }

    /// Loads every level top-down, one read per level, applying deferred
    /// patches as each level becomes ready. A level left empty resets every
    /// level below it.
    pub async fn refresh(&mut self, source: &dyn ReferenceData) {
        self.begin_load(GeoLevel::Country);
        let countries = source.countries().await;
        self.finish_load(GeoLevel::Country, countries);

        let country = self.country.value().to_string();
        if country.is_empty() {
            self.reset_below(GeoLevel::Country);
            return;
        }
        self.begin_load(GeoLevel::Department);
        let departments = source.departments(&country).await;
        self.finish_load(GeoLevel::Department, departments);

        let department = self.department.value().to_string();
        if department.is_empty() {
            self.reset_below(GeoLevel::Department);
            return;
        }
        self.begin_load(GeoLevel::City);
        let cities = source.cities(&country, &department).await;
        self.finish_load(GeoLevel::City, cities);
    }

    fn reset_below(&mut self, level: GeoLevel) {
        match level {
            GeoLevel::Country => {
                self.department.reset();
                self.city.reset();
            }
            GeoLevel::Department => self.city.reset(),
            GeoLevel::City => {}
        }
    }
}

#[cfg(test)]
#[path = "tests/reference_data_tests.rs"]
mod tests;
