use chrono::Utc;
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, LoginRequest, Registration, AUTH_TOKEN_COOKIE},
            voter::VoterProfile,
        },
        common::voter::Role,
        db::{region::Municipality, voter::Voter},
        mongodb::{errors::is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout, whoami]
}

#[post("/auth/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<Registration>,
    voters: Coll<Voter>,
    municipalities: Coll<Municipality>,
    config: &State<Config>,
) -> Result<(Status, Json<VoterProfile>)> {
    let role = if config.is_admin_registration(registration.registration_number.trim()) {
        Role::Administrator
    } else {
        Role::Standard
    };
    let voter = Voter {
        id: Id::new(),
        voter: registration.0.into_voter(role, Utc::now())?,
    };

    // The region is copied onto every vote, so it must come from the catalog.
    let region = doc! {
        "_id": i64::from(voter.region.municipality),
        "department": i64::from(voter.region.department),
    };
    if municipalities.count_documents(region, None).await? == 0 {
        return Err(Error::bad_request("Municipality is not in the given department"));
    }

    // Name the colliding field if we can; the unique indexes remain the authority.
    for (field, label, value) in [
        ("registration_number", "Registration number", &voter.registration_number),
        ("national_id", "National ID", &voter.national_id),
        ("email", "Email", &voter.email),
    ] {
        if voters.count_documents(doc! { field: value }, None).await? > 0 {
            return Err(Error::bad_request(format!("{label} is already registered")));
        }
    }

    match voters.insert_one(&voter, None).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(Error::bad_request("Member is already registered"));
        }
        Err(e) => return Err(e.into()),
    }
    info!("Registered member {} as {:?}", voter.id, voter.role);

    Ok((Status::Created, Json(voter.into())))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<LoginRequest>,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<Json<VoterProfile>> {
    let filter = doc! {
        "registration_number": credentials.registration_number.trim(),
        "national_id": credentials.national_id.trim(),
    };

    let voter = voters
        .find_one(filter, None)
        .await?
        .filter(|voter| {
            voter.date_of_birth == credentials.date_of_birth
                && voter.verify_password(&credentials.password)
        })
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No member found with the provided credentials.".to_string(),
            )
        })?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(voter.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[get("/auth/me")]
pub async fn whoami(token: AuthToken<Voter>, voters: Coll<Voter>) -> Result<Json<VoterProfile>> {
    let voter = voters
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Member"))?;
    Ok(Json(voter.into()))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json};

    use super::*;

    async fn register_expect_status(client: &Client, registration: &Registration, status: Status) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(serde_json::to_string(registration).unwrap())
            .dispatch()
            .await;
        assert_eq!(status, response.status());
    }

    async fn login_status(client: &Client, credentials: &LoginRequest) -> Status {
        client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(serde_json::to_string(credentials).unwrap())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn register_and_login(client: Client, voters: Coll<Voter>) {
        register_expect_status(&client, &Registration::example(), Status::Created).await;

        let stored = voters
            .find_one(doc! { "registration_number": "CIV-10001" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.role, Role::Standard);
        assert!(!stored.has_fully_voted);
        assert_ne!(stored.password_hash, Registration::example().password);

        // Not logged in yet.
        let response = client.get(uri!(whoami)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let status = login_status(&client, &Registration::example().login()).await;
        assert_eq!(Status::Ok, status);

        let response = client.get(uri!(whoami)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let profile: VoterProfile = response.into_json().await.unwrap();
        assert_eq!(profile.registration_number, "CIV-10001");
        assert!(!profile.is_admin);

        // Logging out forgets the member.
        client.delete(uri!(logout)).dispatch().await;
        let response = client.get(uri!(whoami)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn duplicate_registration_names_the_field(client: Client, db: Database) {
        register_expect_status(&client, &Registration::example(), Status::Created).await;

        for (registration, field) in [
            (
                Registration {
                    registration_number: "CIV-10001".to_string(),
                    ..Registration::example2()
                },
                "Registration number",
            ),
            (
                Registration {
                    national_id: Registration::example().national_id,
                    ..Registration::example2()
                },
                "National ID",
            ),
            (
                Registration {
                    email: "ANA.MORALES@example.org".to_string(),
                    ..Registration::example2()
                },
                "Email",
            ),
        ] {
            let response = client
                .post(uri!(register))
                .header(ContentType::JSON)
                .body(serde_json::to_string(&registration).unwrap())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
            let body: serde_json::Value = response.into_json().await.unwrap();
            assert!(
                body["message"].as_str().unwrap().starts_with(field),
                "{body}"
            );
        }

        let count = Coll::<Voter>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test]
    async fn invalid_registrations(client: Client) {
        let mut short_id = Registration::example();
        short_id.national_id = "123".to_string();
        register_expect_status(&client, &short_id, Status::BadRequest).await;

        let mut short_password = Registration::example();
        short_password.password = "short".to_string();
        register_expect_status(&client, &short_password, Status::BadRequest).await;
    }

    #[backend_test]
    async fn regions_must_come_from_the_catalog(client: Client, voters: Coll<Voter>) {
        // 205 exists, but in department 2.
        let mut wrong_department = Registration::example();
        wrong_department.municipality = 205;
        let mut unknown = Registration::example();
        unknown.department = 99;
        unknown.municipality = 9901;
        for registration in [wrong_department, unknown] {
            register_expect_status(&client, &registration, Status::BadRequest).await;
        }
        assert_eq!(voters.count_documents(None, None).await.unwrap(), 0);

        register_expect_status(&client, &Registration::example2(), Status::Created).await;
    }

    #[backend_test]
    async fn login_requires_every_credential(client: Client) {
        register_expect_status(&client, &Registration::example(), Status::Created).await;
        let good = Registration::example().login();

        let mut wrong_password = good.clone();
        wrong_password.password = "not the password".to_string();
        let mut wrong_id = good.clone();
        wrong_id.national_id = "0000000000000".to_string();
        let mut wrong_birthday = good.clone();
        wrong_birthday.date_of_birth = wrong_birthday.date_of_birth.succ_opt().unwrap();

        for credentials in [wrong_password, wrong_id, wrong_birthday] {
            let status = login_status(&client, &credentials).await;
            assert_eq!(Status::Unauthorized, status);
        }
        assert_eq!(Status::Ok, login_status(&client, &good).await);
    }

    #[backend_test]
    async fn listed_registration_numbers_become_admins(client: Client, voters: Coll<Voter>) {
        register_expect_status(&client, &Registration::admin_example(), Status::Created).await;
        let admin = voters
            .find_one(doc! { "registration_number": "ADM-00001" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Administrator);
    }
}
