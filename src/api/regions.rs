use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::region::{DepartmentDescription, MunicipalityDescription},
        db::region::{Department, Municipality},
        mongodb::Coll,
    },
};

pub fn routes() -> Vec<Route> {
    routes![list_departments, list_municipalities]
}

#[get("/departments")]
async fn list_departments(
    departments: Coll<Department>,
) -> Result<Json<Vec<DepartmentDescription>>> {
    let sort = FindOptions::builder().sort(doc! { "name": 1 }).build();
    let all = departments
        .find(None, sort)
        .await?
        .map_ok(DepartmentDescription::from)
        .try_collect()
        .await?;
    Ok(Json(all))
}

#[get("/departments/<code>/municipalities")]
async fn list_municipalities(
    code: u32,
    departments: Coll<Department>,
    municipalities: Coll<Municipality>,
) -> Result<Json<Vec<MunicipalityDescription>>> {
    departments
        .find_one(doc! { "_id": i64::from(code) }, None)
        .await?
        .ok_or_else(|| Error::not_found("Department"))?;

    let sort = FindOptions::builder().sort(doc! { "name": 1 }).build();
    let within = municipalities
        .find(doc! { "department": i64::from(code) }, sort)
        .await?
        .map_ok(MunicipalityDescription::from)
        .try_collect()
        .await?;
    Ok(Json(within))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;

    #[backend_test]
    async fn catalog_is_seeded_from_config(client: Client) {
        let response = client.get(uri!(list_departments)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let departments: Vec<DepartmentDescription> = response.into_json().await.unwrap();
        let names: Vec<_> = departments.iter().map(|d| (d.code, d.name.as_str())).collect();
        assert_eq!(names, vec![(2, "El Progreso"), (1, "Guatemala")]);

        let response = client.get(uri!(list_municipalities(2))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let municipalities: Vec<MunicipalityDescription> = response.into_json().await.unwrap();
        let codes: Vec<_> = municipalities.iter().map(|m| m.code).collect();
        assert_eq!(codes, vec![205, 201]);
        assert!(municipalities.iter().all(|m| m.department == 2));
    }

    #[backend_test]
    async fn unknown_department(client: Client) {
        let response = client.get(uri!(list_municipalities(99))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
