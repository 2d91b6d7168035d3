//! Wizard sections: their keys, records and field-level validation.

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::protocol::{Contact, EconomicActivity, Employment, Facta, Financial, PersonalInfo};

const MAX_FINANCIAL_AMOUNT: u64 = 999_999_999_999;
const MAX_EMPLOYEE_COUNT: u64 = 999_999;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKey {
    PersonalInfo,
    Contact,
    Employment,
    Financial,
    EconomicActivity,
    Facta,
}

impl SectionKey {
    pub const ORDER: [SectionKey; 6] = [
        SectionKey::PersonalInfo,
        SectionKey::Contact,
        SectionKey::Employment,
        SectionKey::Financial,
        SectionKey::EconomicActivity,
        SectionKey::Facta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::PersonalInfo => "personal-info",
            SectionKey::Contact => "contact",
            SectionKey::Employment => "employment",
            SectionKey::Financial => "financial",
            SectionKey::EconomicActivity => "economic-activity",
            SectionKey::Facta => "facta",
        }
    }

    pub fn parse(raw: &str) -> Option<SectionKey> {
        SectionKey::ORDER
            .into_iter()
            .find(|key| key.as_str() == raw.trim())
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One section's fields as reported by the section form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionRecord {
    PersonalInfo(PersonalInfo),
    Contact(Contact),
    Employment(Employment),
    Financial(Financial),
    EconomicActivity(EconomicActivity),
    Facta(Facta),
}

impl SectionRecord {
    pub fn key(&self) -> SectionKey {
        match self {
            SectionRecord::PersonalInfo(_) => SectionKey::PersonalInfo,
            SectionRecord::Contact(_) => SectionKey::Contact,
            SectionRecord::Employment(_) => SectionKey::Employment,
            SectionRecord::Financial(_) => SectionKey::Financial,
            SectionRecord::EconomicActivity(_) => SectionKey::EconomicActivity,
            SectionRecord::Facta(_) => SectionKey::Facta,
        }
    }

    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        self.validate_on(Utc::now().date_naive())
    }

    /// Same as [`SectionRecord::validate`] with an explicit "today" for date rules.
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::default();
        match self {
            SectionRecord::PersonalInfo(info) => check_personal_info(&mut checks, info, today),
            SectionRecord::Contact(contact) => check_contact(&mut checks, contact),
            SectionRecord::Employment(employment) => check_employment(&mut checks, employment),
            SectionRecord::Financial(financial) => check_financial(&mut checks, financial),
            SectionRecord::EconomicActivity(activity) => {
                check_economic_activity(&mut checks, activity)
            }
            SectionRecord::Facta(facta) => check_facta(&mut checks, facta),
        }
        checks.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Required,
    TooShort { min: usize },
    TooLong { max: usize },
    InvalidFormat,
    OutOfRange { min: u64, max: u64 },
    FutureDate,
}

/// A failed rule, named by the field's wire name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            FieldProblem::Required => write!(f, "{} is required", self.field),
            FieldProblem::TooShort { min } => {
                write!(f, "{} needs at least {min} characters", self.field)
            }
            FieldProblem::TooLong { max } => {
                write!(f, "{} allows at most {max} characters", self.field)
            }
            FieldProblem::InvalidFormat => write!(f, "{} has an invalid format", self.field),
            FieldProblem::OutOfRange { min, max } => {
                write!(f, "{} must be between {min} and {max}", self.field)
            }
            FieldProblem::FutureDate => write!(f, "{} cannot be in the future", self.field),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Charset {
    Any,
    /// Latin letters, Spanish accented vowels, `ñ` and whitespace.
    Letters,
    Digits,
    /// ASCII letters, digits and whitespace.
    Alphanumeric,
    /// [`Charset::Alphanumeric`] plus Spanish accented letters.
    AccentedAlphanumeric,
    Email,
}

impl Charset {
    fn accepts(self, value: &str) -> bool {
        match self {
            Charset::Any => true,
            Charset::Letters => value.chars().all(|c| is_letter(c) || c.is_whitespace()),
            Charset::Digits => value.chars().all(|c| c.is_ascii_digit()),
            Charset::Alphanumeric => value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace()),
            Charset::AccentedAlphanumeric => value
                .chars()
                .all(|c| is_letter(c) || c.is_ascii_digit() || c.is_whitespace()),
            Charset::Email => is_email(value),
        }
    }
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || "áéíóúÁÉÍÓÚñÑ".contains(c)
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
        && !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c))
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[derive(Debug, Clone, Copy)]
struct TextRule {
    required: bool,
    min: usize,
    max: usize,
    charset: Charset,
}

impl TextRule {
    const fn required(min: usize, max: usize, charset: Charset) -> Self {
        Self {
            required: true,
            min,
            max,
            charset,
        }
    }

    const fn optional(min: usize, max: usize, charset: Charset) -> Self {
        Self {
            required: false,
            min,
            max,
            charset,
        }
    }
}

const NAME: TextRule = TextRule::required(2, 50, Charset::Letters);
const PLACE: TextRule = TextRule::required(3, 100, Charset::Letters);
const PHONE: TextRule = TextRule::required(7, 15, Charset::Digits);
const EMAIL: TextRule = TextRule::required(1, 254, Charset::Email);
const CHOICE: TextRule = TextRule::required(1, usize::MAX, Charset::Any);

#[derive(Default)]
struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    fn fail(&mut self, field: &'static str, problem: FieldProblem) {
        self.errors.push(FieldError { field, problem });
    }

    /// Empty optional values pass; length and charset apply only to non-empty input.
    fn text(&mut self, field: &'static str, value: &str, rule: TextRule) {
        let value = value.trim();
        if value.is_empty() {
            if rule.required {
                self.fail(field, FieldProblem::Required);
            }
            return;
        }
        let len = value.chars().count();
        if len < rule.min {
            self.fail(field, FieldProblem::TooShort { min: rule.min });
        } else if len > rule.max {
            self.fail(field, FieldProblem::TooLong { max: rule.max });
        } else if !rule.charset.accepts(value) {
            self.fail(field, FieldProblem::InvalidFormat);
        }
    }

    fn range(&mut self, field: &'static str, value: u64, max: u64) {
        if value > max {
            self.fail(field, FieldProblem::OutOfRange { min: 0, max });
        }
    }

    fn date(&mut self, field: &'static str, value: &str, not_after: Option<NaiveDate>) {
        let value = value.trim();
        if value.is_empty() {
            self.fail(field, FieldProblem::Required);
            return;
        }
        match NaiveDate::parse_from_str(value, DATE_FORMAT) {
            Ok(date) if not_after.is_some_and(|limit| date > limit) => {
                self.fail(field, FieldProblem::FutureDate)
            }
            Ok(_) => {}
            Err(_) => self.fail(field, FieldProblem::InvalidFormat),
        }
    }

    fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn check_personal_info(checks: &mut Checks, info: &PersonalInfo, today: NaiveDate) {
    checks.text("tipoDocumento", &info.document_type, CHOICE);
    checks.text(
        "numeroDocumento",
        &info.document_number,
        TextRule::required(6, 20, Charset::Digits),
    );
    checks.text("lugarExpedicion", &info.place_of_issue, PLACE);
    checks.text("ciudadNacimiento", &info.city_of_birth, PLACE);
    checks.date("fechaNacimiento", &info.birth_date, None);
    checks.date("fechaExpedicion", &info.issue_date, Some(today));
    checks.text("primerNombre", &info.first_name, NAME);
    checks.text(
        "segundoNombre",
        &info.middle_name,
        TextRule::optional(2, 50, Charset::Letters),
    );
    checks.text("primerApellido", &info.first_surname, NAME);
    checks.text(
        "segundoApellido",
        &info.second_surname,
        TextRule::optional(0, 50, Charset::Letters),
    );
    checks.text("genero", &info.gender, CHOICE);
    checks.text("nacionalidad", &info.nationality, CHOICE);
    checks.text("estadoCivil", &info.marital_status, CHOICE);
    checks.text("grupoEtnico", &info.ethnic_group, CHOICE);
}

fn check_contact(checks: &mut Checks, contact: &Contact) {
    checks.text(
        "direccion",
        &contact.address,
        TextRule::required(5, 200, Charset::Any),
    );
    checks.text(
        "barrio",
        &contact.neighbourhood,
        TextRule::required(2, 100, Charset::AccentedAlphanumeric),
    );
    checks.text("pais", &contact.country, PLACE);
    checks.text("departamento", &contact.department, PLACE);
    checks.text("ciudad", &contact.city, PLACE);
    checks.text("telefono", &contact.phone, PHONE);
    checks.text("correo", &contact.email, EMAIL);
    checks.text(
        "bloqueTorre",
        &contact.block_tower,
        TextRule::optional(0, 50, Charset::Alphanumeric),
    );
    checks.text(
        "aptoCasa",
        &contact.apartment,
        TextRule::optional(0, 50, Charset::Alphanumeric),
    );
}

fn check_employment(checks: &mut Checks, employment: &Employment) {
    checks.text(
        "nombreEmpresa",
        &employment.company_name,
        TextRule::required(3, 200, Charset::Any),
    );
    checks.text(
        "direccionEmpresa",
        &employment.company_address,
        TextRule::required(5, 200, Charset::Any),
    );
    checks.text("paisEmpresa", &employment.company_country, PLACE);
    checks.text("departamentoEmpresa", &employment.company_department, PLACE);
    checks.text("ciudadEmpresa", &employment.company_city, PLACE);
    checks.text("telefonoEmpresa", &employment.company_phone, PHONE);
    checks.text(
        "ext",
        &employment.extension,
        TextRule::optional(1, 10, Charset::Digits),
    );
    checks.text(
        "celularEmpresa",
        &employment.company_mobile,
        TextRule::required(10, 15, Charset::Digits),
    );
    checks.text("correoLaboral", &employment.work_email, EMAIL);
}

fn check_financial(checks: &mut Checks, financial: &Financial) {
    checks.range("ingresosMensuales", financial.monthly_income, MAX_FINANCIAL_AMOUNT);
    checks.range("egresosMensuales", financial.monthly_expenses, MAX_FINANCIAL_AMOUNT);
    checks.range("totalActivos", financial.total_assets, MAX_FINANCIAL_AMOUNT);
    checks.range("totalPasivos", financial.total_liabilities, MAX_FINANCIAL_AMOUNT);
}

fn check_economic_activity(checks: &mut Checks, activity: &EconomicActivity) {
    checks.text("profesion", &activity.profession, PLACE);
    checks.text("ocupacion", &activity.occupation, PLACE);
    checks.text(
        "codigoCiiu",
        &activity.ciiu_code,
        TextRule::optional(4, 6, Charset::Digits),
    );
    checks.text(
        "detalleActividad",
        &activity.activity_detail,
        TextRule::optional(5, 500, Charset::Any),
    );
    checks.range("numeroEmpleados", activity.employee_count, MAX_EMPLOYEE_COUNT);
}

fn check_facta(checks: &mut Checks, facta: &Facta) {
    if facta.foreign_resident {
        checks.text("pais", &facta.country, PLACE);
    }
}

#[cfg(test)]
#[path = "tests/sections_tests.rs"]
mod tests;
