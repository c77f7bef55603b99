use std::path::Path;

use color_eyre::{
    eyre::{bail, Context},
    Result,
};
use db::{ingredients::NewIngredient, setup_db_pool, tags::NewTag};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::{
    formats::{is_valid_color, is_valid_slug},
    state::database_url,
};

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = tokio::fs::read(path)
        .await
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_slice(&contents)
        .wrap_err_with(|| format!("{} is not a JSON list of the expected objects", path.display()))
}

/// Rows already in the table are skipped.
#[tracing::instrument(err)]
pub(crate) async fn load_ingredients(path: &Path) -> Result<()> {
    let ingredients: Vec<NewIngredient> = read_json(path).await?;
    let pool = setup_db_pool(&database_url()?).await?;

    let inserted = db::ingredients::Ingredient::insert_many(&pool, &ingredients).await?;
    info!(
        read = ingredients.len(),
        inserted, "Loaded ingredients"
    );

    Ok(())
}

#[tracing::instrument(err)]
pub(crate) async fn load_tags(path: &Path) -> Result<()> {
    let tags: Vec<NewTag> = read_json(path).await?;
    check_tags(&tags)?;
    let pool = setup_db_pool(&database_url()?).await?;

    let inserted = db::tags::Tag::insert_many(&pool, &tags).await?;
    info!(read = tags.len(), inserted, "Loaded tags");

    Ok(())
}

/// Rejects the whole file if any tag has a malformed color or slug.
fn check_tags(tags: &[NewTag]) -> Result<()> {
    for (index, tag) in tags.iter().enumerate() {
        if !is_valid_color(&tag.color) {
            bail!(
                "Tag #{index} ({}) has color {:?}, expected #RRGGBB",
                tag.name,
                tag.color
            );
        }
        if !is_valid_slug(&tag.slug) {
            bail!(
                "Tag #{index} ({}) has slug {:?}, expected letters, digits, - and _",
                tag.name,
                tag.slug
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_json_parses_ingredient_files() {
        let path = std::env::temp_dir().join(format!("ingredients-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            r#"[{"name": "abricot-jam", "measurement_unit": "g"}, {"name": "salt", "measurement_unit": "pinch"}]"#,
        )
        .await
        .unwrap();

        let ingredients: Vec<NewIngredient> = read_json(&path).await.unwrap();

        assert_eq!(ingredients.len(), 2);
        assert_eq!(ingredients[1].measurement_unit, "pinch");
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_json_reports_bad_files() {
        let path = std::env::temp_dir().join(format!("tags-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"{"name": "not a list"}"#).await.unwrap();

        assert!(read_json::<NewTag>(&path).await.is_err());
        assert!(read_json::<NewTag>(Path::new("/definitely/not/here.json"))
            .await
            .is_err());
        tokio::fs::remove_file(&path).await.unwrap();
    }

    fn tag(color: &str, slug: &str) -> NewTag {
        NewTag {
            name: "Breakfast".to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        }
    }

    #[test]
    fn test_check_tags() {
        assert!(check_tags(&[tag("#E26C2D", "breakfast"), tag("#49B64E", "late_lunch")]).is_ok());

        let err = check_tags(&[tag("#E26C2D", "breakfast"), tag("red", "dinner")]).unwrap_err();
        assert!(err.to_string().contains("Tag #1"), "{err}");

        assert!(check_tags(&[tag("#E26C2D", "bad slug")]).is_err());
    }
}
