use color_eyre::{eyre::bail, Result};
use db::{
    setup_db_pool,
    users::{NewUser, User},
};
use tracing::info;

use crate::{
    formats::{is_valid_email, is_valid_username},
    passwords,
    state::database_url,
};

pub(crate) struct Superuser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[tracing::instrument(skip_all, fields(username = %superuser.username), err)]
pub(crate) async fn create_superuser(superuser: Superuser) -> Result<()> {
    if !is_valid_email(&superuser.email) {
        bail!("{} is not a valid email address", superuser.email);
    }
    if !is_valid_username(&superuser.username) {
        bail!("Usernames may contain only letters, numbers, and @/./+/-/_ characters");
    }

    let problems =
        passwords::password_problems(&superuser.password, &superuser.username, &superuser.email);
    if !problems.is_empty() {
        bail!("Password rejected: {}", problems.join(" "));
    }

    let pool = setup_db_pool(&database_url()?).await?;

    if User::email_taken(&pool, &superuser.email).await? {
        bail!("A user with the email {} already exists", superuser.email);
    }
    if User::username_taken(&pool, &superuser.username).await? {
        bail!("A user with the username {} already exists", superuser.username);
    }

    let user = User::create(
        &pool,
        NewUser {
            email: superuser.email,
            username: superuser.username,
            first_name: superuser.first_name,
            last_name: superuser.last_name,
            password_hash: passwords::hash_password(&superuser.password)?,
            is_superuser: true,
        },
    )
    .await?;

    info!(user.id = user.id, "Created superuser");

    Ok(())
}
