//! Localised envelope messages.
//!
//! The locale comes from `Accept-Language`. French is the default and English
//! the only alternative; unknown keys are returned unchanged.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl Locale {
    fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next()?.trim().to_ascii_lowercase();
        match primary.as_str() {
            "fr" => Some(Self::Fr),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Picks the supported language with the highest quality value.
    pub fn from_accept_language(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };

        let mut best: Option<(Self, f32)> = None;
        for entry in value.split(',') {
            let mut parts = entry.split(';');
            let Some(locale) = parts.next().and_then(Self::from_tag) else {
                continue;
            };
            let quality = parts
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
                best = Some((locale, quality));
            }
        }

        best.map(|(locale, _)| locale).unwrap_or_default()
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        Ok(Self::from_accept_language(header))
    }
}

/// Resolves a message key for a locale, falling back to the key itself.
pub fn message(key: &str, locale: Locale) -> String {
    let text = match (key, locale) {
        ("order.created", Locale::Fr) => "Commande créée",
        ("order.created", Locale::En) => "Order created",
        ("order.updated", Locale::Fr) => "Commande mise à jour",
        ("order.updated", Locale::En) => "Order updated",
        ("order.deleted", Locale::Fr) => "Commande supprimée",
        ("order.deleted", Locale::En) => "Order deleted",
        ("order.note_added", Locale::Fr) => "Note ajoutée",
        ("order.note_added", Locale::En) => "Note added",
        ("customer.created", Locale::Fr) => "Client créé",
        ("customer.created", Locale::En) => "Customer created",
        ("customer.updated", Locale::Fr) => "Client mis à jour",
        ("customer.updated", Locale::En) => "Customer updated",
        ("customer.deleted", Locale::Fr) => "Client supprimé",
        ("customer.deleted", Locale::En) => "Customer deleted",
        ("product.created", Locale::Fr) => "Produit créé",
        ("product.created", Locale::En) => "Product created",
        ("product.updated", Locale::Fr) => "Produit mis à jour",
        ("product.updated", Locale::En) => "Product updated",
        ("product.deleted", Locale::Fr) => "Produit supprimé",
        ("product.deleted", Locale::En) => "Product deleted",
        ("product.stock_adjusted", Locale::Fr) => "Stock ajusté",
        ("product.stock_adjusted", Locale::En) => "Stock adjusted",
        ("auth.login", Locale::Fr) => "Connexion réussie",
        ("auth.login", Locale::En) => "Logged in",
        ("auth.logout", Locale::Fr) => "Déconnexion réussie",
        ("auth.logout", Locale::En) => "Logged out",
        _ => key,
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_french() {
        assert_eq!(Locale::from_accept_language(None), Locale::Fr);
        assert_eq!(Locale::from_accept_language(Some("de-DE")), Locale::Fr);
        assert_eq!(Locale::from_accept_language(Some("")), Locale::Fr);
    }

    #[test]
    fn honours_quality_values() {
        assert_eq!(Locale::from_accept_language(Some("en-US,en;q=0.9")), Locale::En);
        assert_eq!(
            Locale::from_accept_language(Some("de;q=1.0, en;q=0.4, fr;q=0.8")),
            Locale::Fr
        );
        assert_eq!(Locale::from_accept_language(Some("fr;q=0, en")), Locale::En);
    }

    #[test]
    fn resolves_known_keys_and_echoes_unknown_ones() {
        assert_eq!(message("order.created", Locale::Fr), "Commande créée");
        assert_eq!(message("order.created", Locale::En), "Order created");
        assert_eq!(message("no.such.key", Locale::En), "no.such.key");
    }
}
