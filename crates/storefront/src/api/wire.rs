//! Backend JSON shapes.
//!
//! Field names follow the commerce backend exactly; nothing outside the
//! `api` module sees these types. See `conversions` for the mapping onto
//! `arcade_core` types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `User` resource.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub saldo: Option<Decimal>,
}

/// `Jogo` (catalog item) resource.
///
/// The backend has used several names for the image and category fields
/// over time; all of them are accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JogoDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub preco: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(
        default,
        rename = "dataLancamento",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_lancamento: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avaliacao: Option<f64>,
    #[serde(default, skip_serializing)]
    pub categoria: Option<String>,
    #[serde(default, skip_serializing)]
    pub imagem: Option<String>,
    #[serde(default, rename = "imageURL", skip_serializing)]
    pub image_url_legacy: Option<String>,
    #[serde(default, rename = "imagemUrl", skip_serializing_if = "Option::is_none")]
    pub imagem_url: Option<String>,
}

impl JogoDto {
    /// First non-blank image field, newest name first.
    pub fn image(&self) -> Option<&str> {
        [&self.imagem_url, &self.imagem, &self.image_url_legacy]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|s| !s.trim().is_empty())
    }

    /// First non-blank category field.
    pub fn genres(&self) -> Option<&str> {
        [&self.gender, &self.categoria]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|s| !s.trim().is_empty())
    }
}

/// `Compra` (purchase) resource.
#[derive(Debug, Clone, Deserialize)]
pub struct CompraDto {
    pub id: i64,
    #[serde(default, rename = "usuarioId")]
    pub usuario_id: Option<i64>,
    #[serde(default)]
    pub usuario: Option<UserDto>,
    #[serde(default)]
    pub jogos: Vec<JogoDto>,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
    #[serde(default, rename = "dataCompra")]
    pub data_compra: Option<String>,
    #[serde(default)]
    pub reembolsado: Option<bool>,
}

/// `Avaliacao` (rating) resource.
#[derive(Debug, Clone, Deserialize)]
pub struct AvaliacaoDto {
    #[serde(default)]
    pub id: Option<i64>,
    pub nota: u8,
    #[serde(default)]
    pub comentario: String,
    #[serde(default, rename = "usuarioId")]
    pub usuario_id: Option<i64>,
    #[serde(default, rename = "jogoId")]
    pub jogo_id: Option<i64>,
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub senha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AddToCartRequest {
    #[serde(rename = "jogoId")]
    pub jogo_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TopUpRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RatingRequest<'a> {
    pub nota: u8,
    pub comentario: &'a str,
}

/// Profile update; only the fields present are changed.
#[derive(Debug, Default, Serialize)]
pub struct UserUpdateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

/// Error body shapes the backend produces.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorBody {
    /// First non-blank of `message`, `error`, `details`.
    pub fn into_message(self) -> Option<String> {
        [self.message, self.error, self.details]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}
