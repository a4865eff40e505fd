//! Categories and statuses: open reads, staff-only writes.

use validator::Validate;

use crate::models::auth::Principal;
use crate::models::task::{NamedEntity, NamedRequest};
use crate::repository::{NamedRepository, NamedStore, Repositories};
use crate::services::access;
use crate::utils::errors::ServiceError;
use crate::utils::pagination::{Page, PageRequest};

fn not_found<T: NamedEntity>() -> ServiceError {
    ServiceError::NotFound(format!("{} not found", T::LABEL))
}

fn store<T: NamedEntity>(repos: &Repositories) -> &dyn NamedRepository<T>
where
    Repositories: NamedStore<T>,
{
    <Repositories as NamedStore<T>>::named(repos)
}

fn clean_name(req: NamedRequest) -> Result<String, ServiceError> {
    let req = NamedRequest {
        name: req.name.trim().to_string(),
    };
    req.validate()?;
    Ok(req.name)
}

pub async fn list<T: NamedEntity>(
    repos: &Repositories,
    name_contains: Option<&str>,
    page: PageRequest,
) -> Result<Page<T>, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let name_contains = name_contains.filter(|n| !n.is_empty());
    let (rows, count) = store::<T>(repos).list(name_contains, page).await?;
    Page::new(rows, count, page)
}

pub async fn get<T: NamedEntity>(repos: &Repositories, id: i32) -> Result<T, ServiceError>
where
    Repositories: NamedStore<T>,
{
    store::<T>(repos).find(id).await?.ok_or_else(not_found::<T>)
}

pub async fn create<T: NamedEntity>(
    repos: &Repositories,
    principal: Option<Principal>,
    req: NamedRequest,
) -> Result<T, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let principal = access::ensure_staff(principal)?;
    let name = clean_name(req)?;

    let row = store::<T>(repos).create(&name).await?;
    log::info!("{} {} created by user {}", T::LABEL, row.id(), principal.id);
    Ok(row)
}

pub async fn update<T: NamedEntity>(
    repos: &Repositories,
    principal: Option<Principal>,
    id: i32,
    req: NamedRequest,
) -> Result<T, ServiceError>
where
    Repositories: NamedStore<T>,
{
    let principal = access::ensure_staff(principal)?;
    let name = clean_name(req)?;

    let row = store::<T>(repos)
        .update(id, &name)
        .await?
        .ok_or_else(not_found::<T>)?;
    log::info!("{} {} renamed to '{}' by user {}", T::LABEL, id, row.name(), principal.id);
    Ok(row)
}

/// Refused while any task still points at the row.
pub async fn delete<T: NamedEntity>(
    repos: &Repositories,
    principal: Option<Principal>,
    id: i32,
) -> Result<(), ServiceError>
where
    Repositories: NamedStore<T>,
{
    let principal = access::ensure_staff(principal)?;
    let rows = store::<T>(repos);

    if rows.find(id).await?.is_none() {
        return Err(not_found::<T>());
    }
    if rows.is_referenced(id).await? {
        return Err(ServiceError::ValidationError(format!(
            "Cannot delete {} {}: it is referenced by existing tasks",
            T::LABEL.to_lowercase(),
            id
        )));
    }

    if !rows.delete(id).await? {
        return Err(not_found::<T>());
    }
    log::info!("{} {} deleted by user {}", T::LABEL, id, principal.id);
    Ok(())
}
