// src/engine/purchase.rs

use serde::Serialize;
use sqlx::SqlitePool;

use super::{error::QuizError, ledger};

/// A fixed star package: `stars` granted for `gems_cost` gems.
#[derive(Debug, Clone, Copy)]
pub struct StarPackage {
    pub name: &'static str,
    pub stars: i64,
    pub gems_cost: i64,
}

/// The product catalog. Package names are part of the API surface.
pub const PACKAGES: [StarPackage; 6] = [
    StarPackage { name: "small", stars: 2, gems_cost: 1 },
    StarPackage { name: "medium", stars: 5, gems_cost: 10 },
    StarPackage { name: "large", stars: 10, gems_cost: 15 },
    StarPackage { name: "huge", stars: 15, gems_cost: 20 },
    StarPackage { name: "luxury", stars: 50, gems_cost: 30 },
    StarPackage { name: "legendary", stars: 100, gems_cost: 69 },
];

pub fn package(name: &str) -> Option<&'static StarPackage> {
    PACKAGES.iter().find(|pkg| pkg.name == name)
}

/// Result of a completed purchase: the new balances.
#[derive(Debug, Serialize)]
pub struct PurchaseOutcome {
    pub stars: i64,
    pub gems: i64,
    pub purchased_package: String,
}

/// Exchanges gems for stars in one transaction. The affordability check and
/// both balance movements commit together or not at all.
pub async fn buy_star_package(
    pool: &SqlitePool,
    user_id: i64,
    package_name: &str,
) -> Result<PurchaseOutcome, QuizError> {
    let pkg = package(package_name).ok_or(QuizError::InvalidPackage)?;

    let mut tx = pool.begin().await?;

    let balance = ledger::balance_of(&mut tx, user_id).await?;
    if balance.gems < pkg.gems_cost {
        return Err(QuizError::InsufficientGems {
            current_stars: balance.stars,
            current_gems: balance.gems,
        });
    }

    let gems = ledger::adjust_gems(&mut tx, user_id, -pkg.gems_cost).await?;
    let stars = ledger::adjust_stars(&mut tx, user_id, pkg.stars).await?;

    tx.commit().await?;

    Ok(PurchaseOutcome {
        stars,
        gems,
        purchased_package: pkg.name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_packages_resolve() {
        let pkg = package("small").unwrap();
        assert_eq!(pkg.stars, 2);
        assert_eq!(pkg.gems_cost, 1);

        let pkg = package("legendary").unwrap();
        assert_eq!(pkg.stars, 100);
        assert_eq!(pkg.gems_cost, 69);
    }

    #[test]
    fn unknown_package_is_none() {
        assert!(package("mega").is_none());
        assert!(package("").is_none());
    }

    #[test]
    fn catalog_costs_are_positive() {
        for pkg in PACKAGES {
            assert!(pkg.stars > 0);
            assert!(pkg.gems_cost > 0);
        }
    }
}
