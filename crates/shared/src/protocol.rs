use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{TellerId, TillId, TransferId, TransferState, UserId};

/// Accepts a JSON number, a numeric string, an empty string or `null`.
/// Older client rows store money columns as text.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Float(f64),
        Text(String),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Float(value) if value >= 0.0 && value.fract() == 0.0 => Ok(value as u64),
        Raw::Float(value) => Err(serde::de::Error::custom(format!(
            "expected a whole non-negative amount, got {value}"
        ))),
        Raw::Text(text) if text.trim().is_empty() => Ok(0),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount {text:?}"))),
        Raw::Null(()) => Ok(0),
    }
}

/// Accepts text, `null`, or a bare number (document and phone numbers are
/// sometimes stored as numeric columns).
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Unsigned(value) => value.to_string(),
        Raw::Signed(value) => value.to_string(),
        Raw::Float(value) => value.to_string(),
        Raw::Null(()) => String::new(),
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    #[serde(rename = "tipoDocumento", deserialize_with = "lenient_string")]
    pub document_type: String,
    #[serde(rename = "numeroDocumento", deserialize_with = "lenient_string")]
    pub document_number: String,
    #[serde(rename = "lugarExpedicion", deserialize_with = "lenient_string")]
    pub place_of_issue: String,
    #[serde(rename = "ciudadNacimiento", deserialize_with = "lenient_string")]
    pub city_of_birth: String,
    #[serde(rename = "fechaNacimiento", deserialize_with = "lenient_string")]
    pub birth_date: String,
    #[serde(rename = "fechaExpedicion", deserialize_with = "lenient_string")]
    pub issue_date: String,
    #[serde(rename = "primerNombre", deserialize_with = "lenient_string")]
    pub first_name: String,
    #[serde(rename = "segundoNombre", deserialize_with = "lenient_string")]
    pub middle_name: String,
    #[serde(rename = "primerApellido", deserialize_with = "lenient_string")]
    pub first_surname: String,
    #[serde(rename = "segundoApellido", deserialize_with = "lenient_string")]
    pub second_surname: String,
    #[serde(rename = "genero", deserialize_with = "lenient_string")]
    pub gender: String,
    #[serde(rename = "nacionalidad", deserialize_with = "lenient_string")]
    pub nationality: String,
    #[serde(rename = "otraNacionalidad", deserialize_with = "lenient_string")]
    pub other_nationality: String,
    #[serde(rename = "estadoCivil", deserialize_with = "lenient_string")]
    pub marital_status: String,
    #[serde(rename = "grupoEtnico", deserialize_with = "lenient_string")]
    pub ethnic_group: String,
}

pub const DOMESTIC_COUNTRY: &str = "Colombia";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(rename = "direccion", deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(rename = "barrio", deserialize_with = "lenient_string")]
    pub neighbourhood: String,
    #[serde(rename = "pais", deserialize_with = "lenient_string")]
    pub country: String,
    #[serde(rename = "departamento", deserialize_with = "lenient_string")]
    pub department: String,
    #[serde(rename = "ciudad", deserialize_with = "lenient_string")]
    pub city: String,
    #[serde(rename = "telefono", deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(rename = "correo", deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(rename = "bloqueTorre", deserialize_with = "lenient_string")]
    pub block_tower: String,
    #[serde(rename = "aptoCasa", deserialize_with = "lenient_string")]
    pub apartment: String,
}

impl Contact {
    pub fn is_domestic(&self) -> bool {
        self.country == DOMESTIC_COUNTRY
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employment {
    #[serde(rename = "nombreEmpresa", deserialize_with = "lenient_string")]
    pub company_name: String,
    #[serde(rename = "direccionEmpresa", deserialize_with = "lenient_string")]
    pub company_address: String,
    #[serde(rename = "paisEmpresa", deserialize_with = "lenient_string")]
    pub company_country: String,
    #[serde(rename = "departamentoEmpresa", deserialize_with = "lenient_string")]
    pub company_department: String,
    #[serde(rename = "ciudadEmpresa", deserialize_with = "lenient_string")]
    pub company_city: String,
    #[serde(rename = "telefonoEmpresa", deserialize_with = "lenient_string")]
    pub company_phone: String,
    #[serde(rename = "ext", deserialize_with = "lenient_string")]
    pub extension: String,
    #[serde(rename = "celularEmpresa", deserialize_with = "lenient_string")]
    pub company_mobile: String,
    #[serde(rename = "correoLaboral", deserialize_with = "lenient_string")]
    pub work_email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Financial {
    #[serde(rename = "ingresosMensuales", deserialize_with = "lenient_u64")]
    pub monthly_income: u64,
    #[serde(rename = "egresosMensuales", deserialize_with = "lenient_u64")]
    pub monthly_expenses: u64,
    #[serde(rename = "totalActivos", deserialize_with = "lenient_u64")]
    pub total_assets: u64,
    #[serde(rename = "totalPasivos", deserialize_with = "lenient_u64")]
    pub total_liabilities: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicActivity {
    #[serde(rename = "profesion", deserialize_with = "lenient_string")]
    pub profession: String,
    #[serde(rename = "ocupacion", deserialize_with = "lenient_string")]
    pub occupation: String,
    #[serde(
        rename = "codigoCiiu",
        alias = "codigoCIIU",
        deserialize_with = "lenient_string"
    )]
    pub ciiu_code: String,
    #[serde(rename = "detalleActividad", deserialize_with = "lenient_string")]
    pub activity_detail: String,
    #[serde(rename = "numeroEmpleados", deserialize_with = "lenient_u64")]
    pub employee_count: u64,
    #[serde(rename = "factaCrs", deserialize_with = "lenient_bool")]
    pub facta_crs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facta {
    #[serde(rename = "esResidenteExtranjero", deserialize_with = "lenient_bool")]
    pub foreign_resident: bool,
    #[serde(rename = "pais", deserialize_with = "lenient_string")]
    pub country: String,
}

/// The single client shape the backend reads and writes: personal fields at
/// the top level, every other section nested under its own key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(flatten)]
    pub personal: PersonalInfo,
    #[serde(rename = "contacto", default)]
    pub contact: Option<Contact>,
    #[serde(rename = "laboral", default)]
    pub employment: Option<Employment>,
    #[serde(rename = "financiera", default)]
    pub financial: Option<Financial>,
    #[serde(rename = "actividad", default)]
    pub economic_activity: Option<EconomicActivity>,
    #[serde(default)]
    pub facta: Option<Facta>,
}

/// Envelope used by the advisor endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "contrasena")]
    pub password: String,
    #[serde(rename = "rol")]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Claims carried in the login token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id_usuario: UserId,
    pub correo: String,
    pub nombre: String,
    pub rol: String,
    #[serde(default)]
    pub id_usuario_rol: Option<i64>,
    #[serde(default)]
    pub id_caja: Option<TillId>,
    #[serde(default)]
    pub nombre_caja: Option<String>,
}

/// Who performed a till operation; the backend records it for auditing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TillAudit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_usuario: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_caja: Option<TillId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre_caja: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransferRequest {
    #[serde(rename = "cajeroOrigen")]
    pub origin_teller: TellerId,
    #[serde(rename = "cajeroDestino")]
    pub destination_teller: TellerId,
    #[serde(rename = "monto")]
    pub amount: u64,
    #[serde(flatten)]
    pub audit: TillAudit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptTransferRequest {
    #[serde(rename = "idTraslado")]
    pub transfer_id: TransferId,
    #[serde(rename = "cajeroDestino")]
    pub destination_teller: TellerId,
    #[serde(flatten)]
    pub audit: TillAudit,
}

/// Envelope used by the teller endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TillResponse<T> {
    #[serde(rename = "exito")]
    pub success: bool,
    #[serde(rename = "mensaje", default)]
    pub message: String,
    #[serde(rename = "datos", default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    #[serde(rename = "idTraslado")]
    pub transfer_id: TransferId,
    #[serde(rename = "cajeroOrigen")]
    pub origin_teller: TellerId,
    #[serde(rename = "cajeroDestino", default, skip_serializing_if = "Option::is_none")]
    pub destination_teller: Option<TellerId>,
    #[serde(rename = "monto")]
    pub amount: u64,
    #[serde(rename = "fechaEnvio")]
    pub sent_at: DateTime<Utc>,
    #[serde(rename = "fechaAceptacion", default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TransferState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransfersResponse {
    #[serde(rename = "exito")]
    pub success: bool,
    #[serde(rename = "mensaje", default)]
    pub message: String,
    #[serde(rename = "traslados", default)]
    pub transfers: Vec<TransferPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceOptionsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<String>,
}
