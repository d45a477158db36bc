//! Backend DTO → domain type conversions.

use chrono::{NaiveDate, NaiveDateTime};

use rust_decimal::Decimal;

use arcade_core::{
    DEFAULT_RATING, Email, Identity, ImageRef, Item, ItemDraft, ItemId, Money, Purchase,
    PurchaseId, Rating, RatingId, Score, UserId, tags_from_genres,
};

use super::ApiError;
use super::wire::{AvaliacaoDto, CompraDto, JogoDto, UserDto};

pub fn convert_user(dto: UserDto) -> Result<Identity, ApiError> {
    let id = dto
        .id
        .ok_or_else(|| ApiError::Parse("user response has no id".to_string()))?;
    let email = Email::parse(&dto.email)
        .map_err(|e| ApiError::Parse(format!("user {id} has an invalid email: {e}")))?;
    let display_name = if dto.nome.trim().is_empty() {
        email.default_display_name()
    } else {
        dto.nome
    };
    Ok(Identity {
        id: UserId::new(id),
        display_name,
        email,
        balance: dto.saldo.map_or(Money::ZERO, |s| Money::new(s).non_negative()),
    })
}

/// Convert a catalog entry. `position` is the entry's index in the listing
/// it came from, used for the stock image when the entry has no id.
pub fn convert_item(dto: JogoDto, position: usize) -> Result<Item, ApiError> {
    let id = dto
        .id
        .ok_or_else(|| ApiError::Parse(format!("item '{}' has no id", dto.nome)))?;
    let item_id = ItemId::new(id);
    let price = Money::new(dto.preco);
    let item = Item {
        id: item_id,
        image: ImageRef::from_backend(dto.image(), Some(item_id), position),
        tags: tags_from_genres(dto.genres()),
        title: dto.nome,
        price,
        original_price: price,
        discount: 0,
        rating: dto
            .avaliacao
            .filter(|r| r.is_finite() && *r != 0.0)
            .unwrap_or(DEFAULT_RATING),
        description: dto.descricao.filter(|d| !d.trim().is_empty()),
        release_date: dto.data_lancamento.as_deref().and_then(parse_date),
    };
    item.validate()
        .map_err(|e| ApiError::Parse(format!("item {id}: {e}")))?;
    Ok(item)
}

/// Convert a listing, dropping entries that break the item invariants.
pub fn convert_items(dtos: Vec<JogoDto>) -> Vec<Item> {
    dtos.into_iter()
        .enumerate()
        .filter_map(|(position, dto)| match convert_item(dto, position) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping catalog entry that breaks item invariants");
                None
            }
        })
        .collect()
}

/// Convert a purchase record. `owner_hint` is used when the record does not
/// say who it belongs to.
pub fn convert_purchase(dto: CompraDto, owner_hint: Option<UserId>) -> Result<Purchase, ApiError> {
    let owner = dto
        .usuario_id
        .or_else(|| dto.usuario.as_ref().and_then(|u| u.id))
        .map(UserId::new)
        .or(owner_hint)
        .ok_or_else(|| ApiError::Parse(format!("purchase {} has no owner", dto.id)))?;
    Ok(Purchase::new(
        PurchaseId::new(dto.id),
        owner,
        convert_items(dto.jogos),
        Money::new(dto.valor),
        dto.data_compra.as_deref().and_then(parse_date_time),
        dto.reembolsado.unwrap_or(false),
    ))
}

/// Wire form of a draft. `image_url` is the already-checked artwork URL;
/// `None` sends an empty image so the backend stores none.
pub fn draft_to_wire(draft: &ItemDraft, image_url: Option<&str>) -> JogoDto {
    JogoDto {
        id: None,
        nome: draft.title.trim().to_string(),
        gender: draft.genres(),
        preco: draft.price.amount(),
        descricao: Some(draft.description.clone().unwrap_or_default()),
        data_lancamento: draft.release_date.map(|d| d.format("%Y-%m-%d").to_string()),
        imagem_url: Some(image_url.unwrap_or_default().to_string()),
        ..JogoDto::default()
    }
}

/// Parse a wallet response.
///
/// The backend answers with a bare JSON number; a quoted number or an object
/// carrying `saldo` is accepted too.
pub fn parse_balance(body: &str) -> Result<Money, ApiError> {
    let value: serde_json::Value = serde_json::from_str(body.trim())
        .map_err(|e| ApiError::Parse(format!("wallet response is not JSON: {e}")))?;
    let amount = match &value {
        serde_json::Value::Object(map) => map.get("saldo").or_else(|| map.get("valor")),
        other => Some(other),
    };
    let amount = match amount {
        Some(serde_json::Value::Number(n)) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse::<Decimal>().ok(),
        Some(serde_json::Value::Null) | None => Some(Decimal::ZERO),
        Some(_) => None,
    };
    amount
        .map(|a| Money::new(a).non_negative())
        .ok_or_else(|| ApiError::Parse(format!("unexpected wallet response: {body}")))
}

pub fn convert_rating(dto: AvaliacaoDto) -> Result<Rating, ApiError> {
    Ok(Rating {
        id: dto.id.map(RatingId::new),
        score: Score::new(dto.nota).map_err(|e| ApiError::Parse(e.to_string()))?,
        comment: dto.comentario,
        author: dto.usuario_id.map(UserId::new),
        item: dto.jogo_id.map(ItemId::new),
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(raw).map(|dt| dt.date()))
}

fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
