use serde::Serialize;

use super::{Entity, EntityRepository, RepositoryOptions};
use crate::error::RecordError;
use crate::models::Company;
use crate::seed;
use crate::store::Store;

impl Entity for Company {
    type New = Company;
    const COLLECTION: &'static str = "companies";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_new(id: String, new: Company) -> Self {
        Self { id, ..new }
    }

    fn seed() -> Vec<Self> {
        seed::companies()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::Invalid("empty id".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(RecordError::Invalid("company name is empty".to_string()));
        }
        Ok(())
    }
}

pub struct CompanyRepository<'s> {
    inner: EntityRepository<'s, Company>,
}

impl<'s> CompanyRepository<'s> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            inner: EntityRepository::new(store, options),
        }
    }

    pub fn get_all(&self) -> Vec<Company> {
        self.inner.get_all()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Company> {
        self.inner.get_by_id(id)
    }

    pub fn create(&self, company: Company) -> Company {
        self.inner.create(company)
    }

    pub fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> Option<Company> {
        self.inner.update(id, patch)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }

    pub fn by_industry(&self, industry: &str) -> Vec<Company> {
        self.inner
            .get_all()
            .into_iter()
            .filter(|c| c.industry.eq_ignore_ascii_case(industry))
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Company> {
        let needle = name.trim().to_lowercase();
        self.inner
            .get_all()
            .into_iter()
            .find(|c| c.name.to_lowercase() == needle)
    }

    /// Existing company with this name, or a newly stored one.
    pub fn get_or_create(&self, name: &str) -> Company {
        self.find_by_name(name)
            .unwrap_or_else(|| self.inner.create(Company::named(name.trim())))
    }
}
