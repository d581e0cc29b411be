//! Organization repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewOrganizationRecord, OrganizationRecord};
use super::pool::{DbError, DbPool};
use crate::models::{NewOrganization, Organization};
use crate::schema::organizations;
use crate::with_conn;

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: DbPool,
}

impl OrganizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert an organization unless its registered title already exists.
    ///
    /// Returns whether a row was inserted.
    pub async fn insert_or_ignore(&self, org: &NewOrganization) -> Result<bool, DbError> {
        let record = NewOrganizationRecord {
            registered_organisation_title: &org.registered_title,
            search_title: &org.search_title,
            category: &org.category,
        };

        with_conn!(self.pool, conn => {
            let inserted = diesel::insert_or_ignore_into(organizations::table)
                .values(&record)
                .execute(&mut conn)
                .await?;
            Ok(inserted > 0)
        })
    }

    /// Look up the organization a search log key refers to.
    ///
    /// Search titles are not unique; the earliest inserted match wins.
    pub async fn find_by_search_title(
        &self,
        search_title: &str,
    ) -> Result<Option<Organization>, DbError> {
        with_conn!(self.pool, conn => {
            organizations::table
                .filter(organizations::search_title.eq(search_title))
                .order(organizations::id.asc())
                .select(OrganizationRecord::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map(|r| r.map(Organization::from))
        })
    }

    /// All organizations in insertion order.
    pub async fn get_all(&self) -> Result<Vec<Organization>, DbError> {
        with_conn!(self.pool, conn => {
            organizations::table
                .order(organizations::id.asc())
                .select(OrganizationRecord::as_select())
                .load(&mut conn)
                .await
                .map(|records| records.into_iter().map(Organization::from).collect())
        })
    }

    pub async fn count(&self) -> Result<u64, DbError> {
        use diesel::dsl::count_star;
        with_conn!(self.pool, conn => {
            let count: i64 = organizations::table
                .select(count_star())
                .first(&mut conn)
                .await?;
            Ok(count as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;

    async fn setup() -> (tempfile::TempDir, DbContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (dir, ctx)
    }

    fn org(title: &str, search: &str) -> NewOrganization {
        NewOrganization {
            registered_title: title.to_string(),
            search_title: search.to_string(),
            category: "Trade and business associations".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_ignores_duplicate_registered_title() {
        let (_dir, ctx) = setup().await;
        let repo = ctx.organizations();

        assert!(repo.insert_or_ignore(&org("Eurofer AISBL", "Eurofer")).await.unwrap());
        assert!(!repo.insert_or_ignore(&org("Eurofer AISBL", "Other")).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);

        let found = repo.find_by_search_title("Eurofer").await.unwrap().unwrap();
        assert_eq!(found.registered_title, "Eurofer AISBL");
        assert!(repo.find_by_search_title("Other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_preserves_insertion_order() {
        let (_dir, ctx) = setup().await;
        let repo = ctx.organizations();
        repo.insert_or_ignore(&org("B org", "B")).await.unwrap();
        repo.insert_or_ignore(&org("A org", "A")).await.unwrap();

        let titles: Vec<_> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.search_title)
            .collect();
        assert_eq!(titles, vec!["B", "A"]);
    }
}
