//! # Catalog
//!
//! Course documents come from several generations of tooling. Everything is
//! read through [`normalize_course`], which tolerates legacy field names,
//! prices stored as strings, lowercase levels and missing flags.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    collections, slugify, ActivityKind, Course, CourseId, CourseInput, CourseRef,
    CourseSummary, Document, DocumentStore, DomainError, IssuedCertificate, MediaStorage, Query,
    Result, UserProfile,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::activity::{ActivityFeed, NewActivity};
use crate::users::actor_of;

/// Listing tweaks that are not stored on the course itself.
#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    /// Slugs shown with an "upcoming" badge.
    pub upcoming_slugs: Vec<String>,
    /// Overrides every listed price when set.
    pub flat_listing_price: Option<f64>,
}

/// A course document as stored. Every accessor takes the canonical key
/// first, then legacy aliases, and treats a value of the wrong shape as
/// absent.
struct RawCourse<'a>(&'a Map<String, Value>);

impl<'a> RawCourse<'a> {
    fn field(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().filter_map(|k| self.0.get(*k)).find(|v| !v.is_null())
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    fn number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(number)
    }

    fn flag(&self, keys: &[&str]) -> Option<bool> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    fn timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(timestamp)
    }
}

fn number(value: &Value) -> Option<f64> {
    let n: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_start_matches(['$', '₦']).replace(',', "").parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// RFC 3339 strings, epoch milliseconds, or `{seconds, nanoseconds}` maps
/// (with or without leading underscores).
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim()).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(o) => {
            let seconds = o.get("seconds").or_else(|| o.get("_seconds"))?.as_i64()?;
            let nanos = o
                .get("nanoseconds")
                .or_else(|| o.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

/// Reads one course document. The document key is the course id.
pub fn normalize_course(doc: Document) -> Result<Course> {
    let Value::Object(map) = &doc.data else {
        return Err(DomainError::Storage(format!("course {} is not an object", doc.id)));
    };
    let raw = RawCourse(map);

    let Some(title) = raw.text(&["title", "name", "courseTitle"]) else {
        return Err(DomainError::Storage(format!("course {} has no title", doc.id)));
    };
    let slug = raw.text(&["slug"]).unwrap_or_else(|| slugify(&title));
    let published = match (raw.flag(&["published", "isPublished"]), raw.text(&["status"])) {
        (Some(flag), _) => flag,
        (None, Some(status)) => status.eq_ignore_ascii_case("published"),
        (None, None) => true,
    };
    let instructor = match raw.field(&["instructor", "instructorName", "teacher"]) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Object(o)) => o.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        _ => String::new(),
    };
    let rating = match raw.field(&["rating"]) {
        Some(Value::Object(o)) => o.get("average").and_then(number),
        Some(v) => number(v),
        None => None,
    }
    .unwrap_or(0.0);
    let enrolled_students = raw
        .number(&["enrolledStudents", "enrollmentCount", "students"])
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(0);
    let issued_certificates = match raw.field(&["issuedCertificates"]) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| serde_json::from_value::<IssuedCertificate>(v.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };

    Ok(Course {
        id: CourseId::new(doc.id.clone()),
        title,
        slug,
        description: raw.text(&["description", "summary"]).unwrap_or_default(),
        category: raw.text(&["category"]).unwrap_or_default(),
        level: raw
            .text(&["level", "difficulty"])
            .and_then(|l| l.parse().ok())
            .unwrap_or_default(),
        price: raw.number(&["price", "amount", "cost"]).unwrap_or(0.0),
        published,
        instructor,
        enrolled_students,
        rating,
        image_path: raw.text(&["imagePath"]),
        image_url: raw.text(&["imageUrl", "image", "thumbnail"]),
        issued_certificates,
        created_at: raw.timestamp(&["createdAt"]),
    })
}

/// Read side of the catalog.
pub struct CatalogReader {
    store: Arc<dyn DocumentStore>,
    settings: CatalogSettings,
}

impl CatalogReader {
    pub fn new(store: Arc<dyn DocumentStore>, settings: CatalogSettings) -> Self {
        Self { store, settings }
    }

    /// Every readable course, published or not.
    pub async fn all(&self) -> Result<Vec<Course>> {
        let docs = self.store.query(&Query::collection(collections::COURSES)).await?;
        let mut courses: Vec<Course> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                normalize_course(doc)
                    .map_err(|e| tracing::warn!(%id, error = %e, "skipping unreadable course"))
                    .ok()
            })
            .collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    pub async fn published(&self) -> Result<Vec<Course>> {
        Ok(self.all().await?.into_iter().filter(|c| c.published).collect())
    }

    /// Published courses in listing form.
    pub async fn listing(&self) -> Result<Vec<CourseSummary>> {
        Ok(self.published().await?.iter().map(|c| self.summarize(c)).collect())
    }

    pub fn summarize(&self, course: &Course) -> CourseSummary {
        CourseSummary {
            id: course.id.clone(),
            title: course.title.clone(),
            description: course.description.clone(),
            category: course.category.clone(),
            level: course.level,
            price: self.settings.flat_listing_price.unwrap_or(course.price),
            instructor: course.instructor.clone(),
            rating: course.rating,
            enrolled_students: course.enrolled_students,
            slug: course.slug.clone(),
            upcoming: self.settings.upcoming_slugs.iter().any(|s| s == &course.slug),
        }
    }

    /// Any course by document key.
    pub async fn find(&self, id: &CourseId) -> Result<Option<Course>> {
        if id.is_empty() {
            return Ok(None);
        }
        match self.store.get(collections::COURSES, id.as_str()).await? {
            Some(data) => normalize_course(Document { id: id.to_string(), data }).map(Some),
            None => Ok(None),
        }
    }

    pub async fn find_published(&self, id: &CourseId) -> Result<Course> {
        match self.find(id).await? {
            Some(course) if course.published => Ok(course),
            _ => Err(DomainError::not_found("Course", id.as_str())),
        }
    }

    /// Published course by slug, falling back to document id.
    pub async fn get_by_slug_or_id(&self, key: &str) -> Result<Course> {
        let key = key.trim();
        if key.is_empty() {
            return Err(DomainError::Validation("course slug is required".into()));
        }
        if let Some(course) = self.published().await?.into_iter().find(|c| c.slug == key) {
            return Ok(course);
        }
        self.find_published(&CourseId::new(key)).await
    }

    /// Other published courses in `category`, excluding `exclude`.
    pub async fn related(
        &self,
        category: &str,
        exclude: Option<&CourseId>,
        limit: usize,
    ) -> Result<Vec<Course>> {
        let category = category.trim();
        if category.is_empty() {
            return Err(DomainError::Validation("category is required".into()));
        }
        Ok(self
            .published()
            .await?
            .into_iter()
            .filter(|c| c.category.eq_ignore_ascii_case(category))
            .filter(|c| exclude != Some(&c.id))
            .take(limit)
            .collect())
    }
}

/// Write side of the catalog, admin only.
pub struct CourseAdmin {
    store: Arc<dyn DocumentStore>,
    media: Arc<dyn MediaStorage>,
    reader: Arc<CatalogReader>,
    activity: Arc<ActivityFeed>,
}

fn validate_input(input: &CourseInput) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(DomainError::Validation("title is required".into()));
    }
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(DomainError::Validation("price must be a non-negative number".into()));
    }
    Ok(())
}

fn slug_for(input: &CourseInput) -> String {
    match input.slug.as_deref().map(slugify) {
        Some(s) if !s.is_empty() => s,
        _ => slugify(&input.title),
    }
}

impl CourseAdmin {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn MediaStorage>,
        reader: Arc<CatalogReader>,
        activity: Arc<ActivityFeed>,
    ) -> Self {
        Self { store, media, reader, activity }
    }

    async fn ensure_slug_free(&self, slug: &str, except: Option<&CourseId>) -> Result<()> {
        let taken = self
            .reader
            .all()
            .await?
            .iter()
            .any(|c| c.slug == slug && except != Some(&c.id));
        if taken {
            return Err(DomainError::Conflict(format!("slug {slug:?} is already in use")));
        }
        Ok(())
    }

    pub async fn create(&self, admin: &UserProfile, input: CourseInput) -> Result<Course> {
        validate_input(&input)?;
        let slug = slug_for(&input);
        self.ensure_slug_free(&slug, None).await?;

        let course = Course {
            id: CourseId::new(Uuid::now_v7().to_string()),
            title: input.title.trim().to_string(),
            slug,
            description: input.description,
            category: input.category,
            level: input.level,
            price: input.price,
            published: input.published,
            instructor: input.instructor,
            enrolled_students: 0,
            rating: 0.0,
            image_path: input.image_path,
            image_url: input.image_url,
            issued_certificates: Vec::new(),
            created_at: Some(Utc::now()),
        };
        self.store
            .set(collections::COURSES, course.id.as_str(), serde_json::to_value(&course)?)
            .await?;
        tracing::info!(course_id = %course.id, slug = %course.slug, "course created");

        self.activity
            .record_best_effort(
                NewActivity::new(ActivityKind::CourseCreated, actor_of(admin))
                    .course(CourseRef { id: course.id.clone(), title: course.title.clone() })
                    .metadata(json!({ "slug": course.slug, "price": course.price })),
            )
            .await;
        Ok(course)
    }

    /// Replaces the editable fields. Counters, certificates and creation
    /// time are kept.
    pub async fn update(&self, id: &CourseId, input: CourseInput) -> Result<Course> {
        validate_input(&input)?;
        let existing = self
            .reader
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Course", id.as_str()))?;
        let slug = slug_for(&input);
        if slug != existing.slug {
            self.ensure_slug_free(&slug, Some(id)).await?;
        }

        let course = Course {
            title: input.title.trim().to_string(),
            slug,
            description: input.description,
            category: input.category,
            level: input.level,
            price: input.price,
            published: input.published,
            instructor: input.instructor,
            image_path: input.image_path,
            image_url: input.image_url,
            ..existing
        };
        self.store
            .set(collections::COURSES, id.as_str(), serde_json::to_value(&course)?)
            .await?;
        tracing::info!(course_id = %id, "course updated");
        Ok(course)
    }

    /// Deletes the course and, best effort, its stored image.
    pub async fn delete(&self, id: &CourseId) -> Result<()> {
        let course = self
            .reader
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Course", id.as_str()))?;
        self.store.delete(collections::COURSES, id.as_str()).await?;
        tracing::info!(course_id = %id, "course deleted");

        if let Some(key) = course.image_path.as_deref().filter(|k| !k.is_empty()) {
            if let Err(e) = self.media.delete(key).await {
                tracing::warn!(course_id = %id, %key, error = %e, "failed to delete course image");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::CourseLevel;
    use storage_adapters::{MemoryDocumentStore, MemoryMediaStorage};

    fn doc(id: &str, data: Value) -> Document {
        Document { id: id.into(), data }
    }

    async fn seeded(settings: CatalogSettings) -> (Arc<MemoryDocumentStore>, CatalogReader) {
        let store = Arc::new(MemoryDocumentStore::new());
        let rows = [
            ("c1", json!({ "title": "Rust 101", "slug": "rust-101", "category": "Programming", "level": "beginner", "price": 5000, "published": true })),
            ("c2", json!({ "name": "Legacy Go", "category": "programming", "price": "2,500", "status": "published" })),
            ("c3", json!({ "title": "Hidden Draft", "category": "Programming", "published": false })),
            ("c4", json!({ "title": "Watercolour", "category": "Art", "price": 0 })),
            ("c5", json!({ "slug": "no-title" })),
        ];
        for (id, data) in rows {
            store.set(collections::COURSES, id, data).await.unwrap();
        }
        let reader = CatalogReader::new(store.clone(), settings);
        (store, reader)
    }

    fn admin() -> UserProfile {
        serde_json::from_value(json!({ "id": "admin", "email": "admin@x.io", "role": "admin", "displayName": "Root" }))
            .unwrap()
    }

    #[test]
    fn normalizes_legacy_documents() {
        let course = normalize_course(doc(
            "42",
            json!({
                "name": "Data Science",
                "price": "15000",
                "level": "ADVANCED",
                "instructor": { "name": "Grace" },
                "rating": { "average": 4.5, "count": 10 },
                "enrollmentCount": "12",
            }),
        ))
        .unwrap();

        assert_eq!(course.id.as_str(), "42");
        assert_eq!(course.slug, "data-science");
        assert_eq!(course.price, 15000.0);
        assert_eq!(course.level, CourseLevel::Advanced);
        assert_eq!(course.instructor, "Grace");
        assert_eq!(course.rating, 4.5);
        assert_eq!(course.enrolled_students, 12);
        assert!(course.published);
    }

    #[test]
    fn canonical_keys_win_over_aliases() {
        let course = normalize_course(doc(
            "1",
            json!({ "title": "Current", "name": "Old name", "price": 10, "amount": 99, "image": "/a.png" }),
        ))
        .unwrap();
        assert_eq!(course.title, "Current");
        assert_eq!(course.price, 10.0);
        assert_eq!(course.image_url.as_deref(), Some("/a.png"));

        // a blank canonical value falls through to the alias
        let course = normalize_course(doc("2", json!({ "title": " ", "name": "Fallback" }))).unwrap();
        assert_eq!(course.title, "Fallback");
    }

    #[test]
    fn timestamps_accept_stored_map_and_millis_forms() {
        let from_map = normalize_course(doc(
            "1",
            json!({ "title": "A", "createdAt": { "seconds": 1_700_000_000, "nanoseconds": 0 } }),
        ))
        .unwrap();
        assert_eq!(from_map.created_at.map(|t| t.timestamp()), Some(1_700_000_000));

        let from_millis =
            normalize_course(doc("2", json!({ "title": "B", "createdAt": 1_700_000_000_000i64 }))).unwrap();
        assert_eq!(from_millis.created_at, from_map.created_at);

        let unreadable = normalize_course(doc("3", json!({ "title": "C", "createdAt": "last week" }))).unwrap();
        assert!(unreadable.created_at.is_none());
    }

    #[test]
    fn published_flag_accepts_strings_and_ignores_junk() {
        let flag = |v: Value| normalize_course(doc("1", json!({ "title": "A", "published": v }))).unwrap().published;
        assert!(flag(json!("true")));
        assert!(!flag(json!("false")));
        assert!(!flag(json!(0)));
        assert!(flag(json!({ "weird": true })));
    }

    #[test]
    fn mistyped_fields_fall_back_to_defaults() {
        let course = normalize_course(doc(
            "1",
            json!({ "title": "A", "price": [1], "level": 3, "category": null, "issuedCertificates": "none" }),
        ))
        .unwrap();
        assert_eq!(course.price, 0.0);
        assert_eq!(course.level, CourseLevel::default());
        assert_eq!(course.category, "");
        assert!(course.issued_certificates.is_empty());
    }

    #[tokio::test]
    async fn mixed_shape_documents_stay_listed() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set(
                collections::COURSES,
                "legacy",
                json!({ "title": "Both", "name": "Both", "published": "true", "createdAt": { "_seconds": 5 } }),
            )
            .await
            .unwrap();
        let reader = CatalogReader::new(store, CatalogSettings::default());
        assert_eq!(reader.listing().await.unwrap().len(), 1);
    }

    #[test]
    fn untitled_course_is_rejected() {
        assert!(normalize_course(doc("x", json!({ "slug": "x" }))).is_err());
    }

    #[tokio::test]
    async fn listing_only_shows_published_readable_courses() {
        let (_, reader) = seeded(CatalogSettings::default()).await;
        let titles: Vec<_> = reader.listing().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, ["Legacy Go", "Rust 101", "Watercolour"]);
    }

    #[tokio::test]
    async fn listing_applies_flat_price_and_upcoming_badge() {
        let settings = CatalogSettings {
            upcoming_slugs: vec!["rust-101".into()],
            flat_listing_price: Some(1000.0),
        };
        let (_, reader) = seeded(settings).await;
        let listing = reader.listing().await.unwrap();
        assert!(listing.iter().all(|c| c.price == 1000.0));
        let upcoming: Vec<_> = listing.iter().filter(|c| c.upcoming).map(|c| c.slug.as_str()).collect();
        assert_eq!(upcoming, ["rust-101"]);
    }

    #[tokio::test]
    async fn lookup_by_slug_then_id() {
        let (_, reader) = seeded(CatalogSettings::default()).await;
        assert_eq!(reader.get_by_slug_or_id("rust-101").await.unwrap().id.as_str(), "c1");
        assert_eq!(reader.get_by_slug_or_id("c2").await.unwrap().title, "Legacy Go");
        assert!(matches!(reader.get_by_slug_or_id("c3").await, Err(DomainError::NotFound { .. })));
        assert!(matches!(reader.get_by_slug_or_id(" ").await, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn related_matches_category_and_excludes_self() {
        let (_, reader) = seeded(CatalogSettings::default()).await;
        let related = reader
            .related("PROGRAMMING", Some(&CourseId::new("c1")), 5)
            .await
            .unwrap();
        let ids: Vec<_> = related.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c2"]);
        assert!(reader.related("", None, 5).await.is_err());
    }

    fn input(title: &str) -> CourseInput {
        CourseInput {
            title: title.into(),
            slug: None,
            description: "desc".into(),
            category: "Programming".into(),
            level: CourseLevel::Intermediate,
            price: 100.0,
            published: true,
            instructor: "Ada".into(),
            image_path: Some("courses/abc.png".into()),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn admin_create_update_delete() {
        let (store, reader) = seeded(CatalogSettings::default()).await;
        let reader = Arc::new(reader);
        let media = Arc::new(MemoryMediaStorage::new("/uploads"));
        let activity = Arc::new(ActivityFeed::new(store.clone(), 10));
        let admin_svc = CourseAdmin::new(store.clone(), media, reader.clone(), activity);

        let created = admin_svc.create(&admin(), input("Async Rust")).await.unwrap();
        assert_eq!(created.slug, "async-rust");
        assert_eq!(store.count(collections::ACTIVITIES), 1);

        let dup = admin_svc.create(&admin(), input("Rust 101")).await;
        assert!(matches!(dup, Err(DomainError::Conflict(_))));

        let mut changed = input("Async Rust");
        changed.price = 250.0;
        let updated = admin_svc.update(&created.id, changed).await.unwrap();
        assert_eq!(updated.price, 250.0);
        assert_eq!(updated.created_at, created.created_at);

        admin_svc.delete(&created.id).await.unwrap();
        assert!(reader.find(&created.id).await.unwrap().is_none());
        assert!(matches!(admin_svc.delete(&created.id).await, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let (store, reader) = seeded(CatalogSettings::default()).await;
        let activity = Arc::new(ActivityFeed::new(store.clone(), 10));
        let admin_svc = CourseAdmin::new(
            store,
            Arc::new(MemoryMediaStorage::new("/uploads")),
            Arc::new(reader),
            activity,
        );
        let mut bad = input("Cheap");
        bad.price = -1.0;
        assert!(matches!(admin_svc.create(&admin(), bad).await, Err(DomainError::Validation(_))));
    }
}
