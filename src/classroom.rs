//! Google Classroom API client: courses, materials and announcements.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::AuthSession;
use crate::detector::{select_new, sort_newest_first};
use crate::error::{api_error, Result};
use crate::models::{
    Announcement, AnnouncementListResponse, Course, CourseListResponse, CourseWorkListResponse,
    CourseWorkMaterialListResponse, Material, MaterialKind, RawAnnouncement, RawMaterial,
};

/// Base URL for Google Classroom API v1.
const CLASSROOM_API_BASE: &str = "https://classroom.googleapis.com/v1";

const PAGE_SIZE: &str = "100";

/// One page of a list response.
trait Page: DeserializeOwned {
    type Item;
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for CourseListResponse {
    type Item = Course;
    fn into_parts(self) -> (Vec<Course>, Option<String>) {
        (self.courses, self.next_page_token)
    }
}

impl Page for CourseWorkListResponse {
    type Item = RawMaterial;
    fn into_parts(self) -> (Vec<RawMaterial>, Option<String>) {
        (self.course_work, self.next_page_token)
    }
}

impl Page for CourseWorkMaterialListResponse {
    type Item = RawMaterial;
    fn into_parts(self) -> (Vec<RawMaterial>, Option<String>) {
        (self.course_work_material, self.next_page_token)
    }
}

impl Page for AnnouncementListResponse {
    type Item = RawAnnouncement;
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>) {
        (self.announcements, self.next_page_token)
    }
}

/// Read-only client for the Classroom API.
pub struct ClassroomClient {
    session: AuthSession,
    http: Client,
    base_url: String,
}

impl ClassroomClient {
    pub fn new(session: AuthSession) -> Self {
        Self::with_base_url(session, CLASSROOM_API_BASE)
    }

    /// Point the client at another endpoint (used by tests).
    pub fn with_base_url(session: AuthSession, base_url: impl Into<String>) -> Self {
        Self {
            session,
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// List the user's active courses.
    pub async fn list_courses(&self) -> Result<Vec<Course>> {
        let courses: Vec<Course> = self
            .fetch_all::<CourseListResponse>("courses", &[("courseStates", "ACTIVE")])
            .await?;
        let active: Vec<Course> = courses.into_iter().filter(Course::is_active).collect();
        debug!(count = active.len(), "listed active courses");
        Ok(active)
    }

    /// Get one course by ID.
    pub async fn get_course(&self, course_id: &str) -> Result<Course> {
        let response = self
            .http
            .get(format!("{}/courses/{}", self.base_url, course_id))
            .bearer_auth(self.session.access_token())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Coursework and coursework materials created at or after `since`.
    ///
    /// Both collections are paginated to exhaustion, merged, de-duplicated by
    /// ID and returned newest first.
    pub async fn list_materials(&self, course_id: &str, since: DateTime<Utc>) -> Result<Vec<Material>> {
        let posted = self
            .fetch_all::<CourseWorkMaterialListResponse>(
                &format!("courses/{}/courseWorkMaterials", course_id),
                &[],
            )
            .await?
            .into_iter()
            .map(|raw| raw.into_material(MaterialKind::CourseWorkMaterial));

        let coursework = self
            .fetch_all::<CourseWorkListResponse>(&format!("courses/{}/courseWork", course_id), &[])
            .await?
            .into_iter()
            .map(|raw| raw.into_material(MaterialKind::CourseWork));

        let mut materials = select_new(posted.chain(coursework), since);
        sort_newest_first(&mut materials);
        debug!(course_id, count = materials.len(), since = %since, "listed materials");
        Ok(materials)
    }

    /// Announcements created at or after `since`, newest first.
    pub async fn list_announcements(&self, course_id: &str, since: DateTime<Utc>) -> Result<Vec<Announcement>> {
        self.announcements(course_id, since, None).await
    }

    /// The `max` most recent announcements created at or after `since`.
    pub async fn recent_announcements(
        &self,
        course_id: &str,
        since: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<Announcement>> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let mut announcements = self.announcements(course_id, since, Some(max)).await?;
        announcements.truncate(max);
        Ok(announcements)
    }

    async fn announcements(
        &self,
        course_id: &str,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Announcement>> {
        let raw = self
            .fetch_pages::<AnnouncementListResponse, _>(
                &format!("courses/{}/announcements", course_id),
                &[("orderBy", "updateTime desc")],
                |seen| announcements_settled(seen, since, limit),
            )
            .await?;

        let mut announcements = select_new(raw.into_iter().map(Announcement::from), since);
        sort_newest_first(&mut announcements);
        debug!(course_id, count = announcements.len(), since = %since, "listed announcements");
        Ok(announcements)
    }

    /// Follow `nextPageToken` until the collection is exhausted.
    async fn fetch_all<P: Page>(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<P::Item>> {
        self.fetch_pages::<P, _>(path, params, |_| false).await
    }

    /// Follow `nextPageToken` until the collection is exhausted or `done`
    /// returns true for the items fetched so far.
    async fn fetch_pages<P, F>(&self, path: &str, params: &[(&str, &str)], done: F) -> Result<Vec<P::Item>>
    where
        P: Page,
        F: Fn(&[P::Item]) -> bool,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(self.session.access_token())
                .query(params)
                .query(&[("pageSize", PAGE_SIZE)]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let (items, next) = response.json::<P>().await?.into_parts();
            all_items.extend(items);
            if done(&all_items) {
                break;
            }

            match next.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_items)
    }
}

/// Whether later pages of an update-ordered announcement listing can still
/// change the result.
///
/// Nothing unseen was updated after the oldest update seen so far, and an
/// announcement is never created after its last update. Paging is done once
/// that bound falls before `since`, or once `limit` announcements in the
/// window are all strictly newer than it.
fn announcements_settled(seen: &[RawAnnouncement], since: DateTime<Utc>, limit: Option<usize>) -> bool {
    let Some(bound) = seen
        .iter()
        .map(|a| a.update_time.unwrap_or(a.creation_time).max(a.creation_time))
        .min()
    else {
        return false;
    };
    if bound < since {
        return true;
    }
    let Some(limit) = limit else {
        return false;
    };
    if limit == 0 {
        return true;
    }

    let mut ids = HashSet::new();
    let mut created: Vec<DateTime<Utc>> = seen
        .iter()
        .filter(|a| a.creation_time >= since && ids.insert(a.id.as_str()))
        .map(|a| a.creation_time)
        .collect();
    if created.len() < limit {
        return false;
    }
    created.sort_unstable_by(|a, b| b.cmp(a));
    created[limit - 1] > bound
}
