use crate::entities::order;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};

/// Width of generated order references.
pub const REFERENCE_WIDTH: usize = 8;

/// Computes the reference that follows `latest`.
///
/// A missing or non-numeric reference restarts the sequence at `00000001`.
pub fn reference_after(latest: Option<&str>) -> String {
    let next = latest
        .and_then(|reference| reference.trim().parse::<u64>().ok())
        .and_then(|n| n.checked_add(1))
        .unwrap_or(1);
    format!("{next:0width$}", width = REFERENCE_WIDTH)
}

/// Allocates the next order reference for a site.
///
/// The sequence follows the most recently inserted order (highest `order_id`),
/// not the highest reference. A manually entered reference therefore moves the
/// sequence; collisions surface as unique violations and are retried upstream.
pub async fn next_order_reference<C>(conn: &C, site_id: i32) -> Result<String, DbErr>
where
    C: ConnectionTrait,
{
    let latest = order::Entity::find()
        .filter(order::Column::SiteId.eq(site_id))
        .order_by_desc(order::Column::OrderId)
        .one(conn)
        .await?;

    Ok(reference_after(
        latest.as_ref().map(|o| o.order_reference.as_str()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reference_is_one() {
        assert_eq!(reference_after(None), "00000001");
    }

    #[test]
    fn increments_and_pads() {
        assert_eq!(reference_after(Some("00000001")), "00000002");
        assert_eq!(reference_after(Some("00000099")), "00000100");
        assert_eq!(reference_after(Some("41")), "00000042");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(reference_after(Some("  00000007 ")), "00000008");
    }

    #[test]
    fn unparseable_reference_restarts_sequence() {
        assert_eq!(reference_after(Some("CMD-17")), "00000001");
        assert_eq!(reference_after(Some("")), "00000001");
        assert_eq!(reference_after(Some("-3")), "00000001");
    }

    #[test]
    fn wider_numbers_are_not_truncated() {
        assert_eq!(reference_after(Some("99999999")), "100000000");
    }
}
