//! CMIS 1.1 browser binding session over blocking HTTP.
//!
//! # Responsibility
//! - Discover the repository and bind to the first one listed.
//! - Translate session calls into `cmisselector` reads and `cmisaction` posts.
//! - Keep a per-session object cache consulted only when a fetch enables it.
//!
//! # Invariants
//! - Every request carries basic credentials.
//! - Mutations invalidate the cache entries they can affect. Versioning
//!   calls and deletes drop the whole version series.
//! - Content streams are handed out unread; the response body is the reader.

use super::browser_codec::{
    decode_exception, decode_failed_ids, decode_object, decode_object_array, decode_object_id,
    decode_object_list, decode_query_results, decode_repositories, decode_type_definition,
    encode_properties, RepositoryEndpoint,
};
use super::RepositorySession;
use crate::config::SessionConfig;
use crate::error::{CmisError, CmisResult};
use crate::model::{
    CheckIn, ContentStream, Document, IncludeRelationships, ObjectId, OperationContext,
    Properties, QueryRow, RepositoryInfo, RepositoryObject, TypeDefinition, UnfileObject,
    VersioningState,
};
use log::{debug, warn};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Remote repository session speaking the CMIS browser binding.
pub struct BrowserBindingSession {
    http: Client,
    user: String,
    password: String,
    endpoint: RepositoryEndpoint,
    cache: Mutex<HashMap<String, RepositoryObject>>,
}

impl Debug for BrowserBindingSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserBindingSession")
            .field("user", &self.user)
            .field("repository_id", &self.endpoint.info.id)
            .field("repository_url", &self.endpoint.repository_url)
            .finish_non_exhaustive()
    }
}

impl BrowserBindingSession {
    /// Fetches the service document and binds to its first repository.
    ///
    /// # Errors
    /// - `Connection` for transport failures, rejected credentials, an
    ///   undecodable service document, or an empty repository list.
    pub fn connect(config: &SessionConfig) -> CmisResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| CmisError::Connection(format!("http client setup failed: {err}")))?;

        let response = http
            .get(&config.url)
            .basic_auth(&config.user, Some(&config.password))
            .send()
            .map_err(|err| {
                CmisError::Connection(format!("repository endpoint unreachable: {err}"))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CmisError::Connection(format!(
                "credentials rejected for user `{}` (http status {})",
                config.user,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(CmisError::Connection(format!(
                "repository discovery failed with http status {}",
                status.as_u16()
            )));
        }

        let document = response.json::<Value>().map_err(|err| {
            CmisError::Connection(format!("service document is not valid JSON: {err}"))
        })?;
        let endpoint = decode_repositories(&document)
            .map_err(|err| CmisError::Connection(err.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CmisError::Connection(format!("no repository listed at `{}`", config.url))
            })?;

        Ok(Self {
            http,
            user: config.user.clone(),
            password: config.password.clone(),
            endpoint,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.user, Some(&self.password))
    }

    fn send(&self, builder: RequestBuilder, operation: &str) -> CmisResult<Response> {
        let response = self.authorized(builder).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let err = decode_exception(status.as_u16(), &body);
        warn!(
            "event=cmis_request module=session.browser status=error operation={} http_status={} error_code={}",
            operation,
            status.as_u16(),
            err.code()
        );
        Err(err)
    }

    fn read_json(response: Response) -> CmisResult<Value> {
        let body = response.text()?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn get_json(&self, url: &str, params: &[(&str, String)], selector: &str) -> CmisResult<Value> {
        debug!(
            "event=cmis_request module=session.browser status=start operation={}",
            selector
        );
        let mut query = vec![("cmisselector", selector.to_string())];
        query.extend(params.iter().map(|(key, value)| (*key, value.clone())));
        let response = self.send(self.http.get(url).query(&query), selector)?;
        Self::read_json(response)
    }

    fn post_form(&self, url: &str, fields: Vec<(String, String)>, action: &str) -> CmisResult<Value> {
        debug!(
            "event=cmis_request module=session.browser status=start operation={}",
            action
        );
        let mut form = vec![
            ("cmisaction".to_string(), action.to_string()),
            ("succinct".to_string(), "false".to_string()),
        ];
        form.extend(fields);
        let response = self.send(self.http.post(url).form(&form), action)?;
        Self::read_json(response)
    }

    fn post_multipart(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        content: ContentStream,
        action: &str,
    ) -> CmisResult<Value> {
        debug!(
            "event=cmis_request module=session.browser status=start operation={} multipart=true",
            action
        );
        let mut form = Form::new()
            .text("cmisaction", action.to_string())
            .text("succinct", "false");
        for (key, value) in fields {
            form = form.text(key, value);
        }
        form = form.part("content", content_part(content)?);
        let response = self.send(self.http.post(url).multipart(form), action)?;
        Self::read_json(response)
    }

    fn fetch_params(ctx: &OperationContext) -> Vec<(&'static str, String)> {
        vec![
            ("succinct", "false".to_string()),
            (
                "includeAllowableActions",
                ctx.include_allowable_actions.to_string(),
            ),
            (
                "includeRelationships",
                ctx.include_relationships.as_str().to_string(),
            ),
        ]
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, RepositoryObject>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cached(&self, key: &str, ctx: &OperationContext) -> Option<RepositoryObject> {
        if !ctx.cache_enabled || ctx.include_relationships != IncludeRelationships::None {
            return None;
        }
        self.cache().get(key).cloned()
    }

    fn remember(&self, key: String, object: &RepositoryObject, ctx: &OperationContext) {
        if ctx.include_relationships == IncludeRelationships::None {
            self.cache().insert(key, object.clone());
        }
    }

    /// Drops entries for `ids` and every path-keyed entry.
    fn invalidate(&self, ids: &[&str]) {
        self.cache()
            .retain(|key, _| !key.starts_with("path:") && !ids.contains(&key.as_str()));
    }

    /// Drops every cached version in the series of `id`. An uncached `id`
    /// leaves the series unknown, so all cached documents go.
    fn invalidate_series(&self, id: &str) {
        let mut cache = self.cache();
        let known = cache.get(id).map(|object| {
            object
                .as_document()
                .and_then(|document| document.version_series_id.clone())
        });
        cache.retain(|key, object| {
            if key.starts_with("path:") || key == id {
                return false;
            }
            let Some(document) = object.as_document() else {
                return true;
            };
            match &known {
                None => false,
                Some(None) => true,
                Some(Some(series)) => document.version_series_id.as_ref() != Some(series),
            }
        });
    }

    fn object_url(&self) -> &str {
        &self.endpoint.root_folder_url
    }

    /// Root folder URL extended by the segments of `path`, each percent-encoded.
    fn path_url(&self, path: &str) -> CmisResult<Url> {
        let root = self.object_url();
        let mut url = Url::parse(root).map_err(|err| {
            CmisError::InvalidData(format!("root folder url `{root}` is not a URL: {err}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                CmisError::InvalidData(format!("root folder url `{root}` cannot carry a path"))
            })?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }
}

impl RepositorySession for BrowserBindingSession {
    fn repository_info(&self) -> &RepositoryInfo {
        &self.endpoint.info
    }

    fn type_definition(&self, type_id: &str) -> CmisResult<TypeDefinition> {
        let value = self.get_json(
            &self.endpoint.repository_url,
            &[("typeId", type_id.to_string())],
            "typeDefinition",
        )?;
        decode_type_definition(&value)
    }

    fn object(&self, id: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        if let Some(object) = self.cached(id, ctx) {
            return Ok(object);
        }
        let mut params = Self::fetch_params(ctx);
        params.push(("objectId", id.to_string()));
        let value = self.get_json(self.object_url(), &params, "object")?;
        let object = decode_object(&value)?;
        self.remember(id.to_string(), &object, ctx);
        Ok(object)
    }

    fn object_by_path(&self, path: &str, ctx: &OperationContext) -> CmisResult<RepositoryObject> {
        let key = format!("path:{path}");
        if let Some(object) = self.cached(&key, ctx) {
            return Ok(object);
        }
        let url = self.path_url(path)?;
        let value = self.get_json(url.as_str(), &Self::fetch_params(ctx), "object")?;
        let object = decode_object(&value)?;
        self.remember(key, &object, ctx);
        Ok(object)
    }

    fn children(
        &self,
        folder_id: &str,
        ctx: &OperationContext,
    ) -> CmisResult<Vec<RepositoryObject>> {
        let mut params = Self::fetch_params(ctx);
        params.push(("objectId", folder_id.to_string()));
        let value = self.get_json(self.object_url(), &params, "children")?;
        decode_object_list(&value)
    }

    fn query(
        &self,
        statement: &str,
        search_all_versions: bool,
        max_items: Option<u32>,
        _ctx: &OperationContext,
    ) -> CmisResult<Vec<QueryRow>> {
        let mut params = vec![
            ("q", statement.to_string()),
            ("searchAllVersions", search_all_versions.to_string()),
            ("succinct", "false".to_string()),
        ];
        if let Some(max_items) = max_items {
            params.push(("maxItems", max_items.to_string()));
        }
        let value = self.get_json(&self.endpoint.repository_url, &params, "query")?;
        decode_query_results(&value)
    }

    fn create_folder(&self, parent_id: &str, properties: Properties) -> CmisResult<ObjectId> {
        let mut fields = vec![("objectId".to_string(), parent_id.to_string())];
        fields.extend(encode_properties(&properties));
        let value = self.post_form(self.object_url(), fields, "createFolder")?;
        self.invalidate(&[parent_id]);
        decode_object_id(&value)
    }

    fn create_document(
        &self,
        folder_id: &str,
        properties: Properties,
        content: Option<ContentStream>,
        versioning_state: VersioningState,
    ) -> CmisResult<ObjectId> {
        let mut fields = vec![
            ("objectId".to_string(), folder_id.to_string()),
            (
                "versioningState".to_string(),
                versioning_state.as_str().to_string(),
            ),
        ];
        fields.extend(encode_properties(&properties));
        let value = match content {
            Some(content) => {
                self.post_multipart(self.object_url(), fields, content, "createDocument")?
            }
            None => self.post_form(self.object_url(), fields, "createDocument")?,
        };
        self.invalidate(&[folder_id]);
        decode_object_id(&value)
    }

    fn create_relationship(&self, properties: Properties) -> CmisResult<ObjectId> {
        let fields = encode_properties(&properties);
        let value = self.post_form(&self.endpoint.repository_url, fields, "createRelationship")?;
        decode_object_id(&value)
    }

    fn update_properties(&self, id: &str, properties: Properties) -> CmisResult<ObjectId> {
        let mut fields = vec![("objectId".to_string(), id.to_string())];
        fields.extend(encode_properties(&properties));
        let value = self.post_form(self.object_url(), fields, "update")?;
        self.invalidate(&[id]);
        match value {
            Value::Null => Ok(id.to_string()),
            value => decode_object_id(&value),
        }
    }

    fn check_out(&self, id: &str) -> CmisResult<ObjectId> {
        let fields = vec![("objectId".to_string(), id.to_string())];
        let value = self.post_form(self.object_url(), fields, "checkOut")?;
        self.invalidate_series(id);
        decode_object_id(&value)
    }

    fn check_in(&self, pwc_id: &str, check_in: CheckIn) -> CmisResult<ObjectId> {
        let mut fields = vec![
            ("objectId".to_string(), pwc_id.to_string()),
            ("major".to_string(), check_in.major.to_string()),
        ];
        if let Some(comment) = check_in.comment {
            fields.push(("checkinComment".to_string(), comment));
        }
        fields.extend(encode_properties(&check_in.properties));
        let value = match check_in.content {
            Some(content) => self.post_multipart(self.object_url(), fields, content, "checkIn")?,
            None => self.post_form(self.object_url(), fields, "checkIn")?,
        };
        self.invalidate_series(pwc_id);
        decode_object_id(&value)
    }

    fn delete_object(&self, id: &str, all_versions: bool) -> CmisResult<()> {
        let fields = vec![
            ("objectId".to_string(), id.to_string()),
            ("allVersions".to_string(), all_versions.to_string()),
        ];
        self.post_form(self.object_url(), fields, "delete")?;
        self.invalidate_series(id);
        Ok(())
    }

    fn delete_tree(
        &self,
        folder_id: &str,
        all_versions: bool,
        unfile: UnfileObject,
        continue_on_failure: bool,
    ) -> CmisResult<Vec<ObjectId>> {
        let fields = vec![
            ("objectId".to_string(), folder_id.to_string()),
            ("allVersions".to_string(), all_versions.to_string()),
            ("unfileObjects".to_string(), unfile.as_str().to_string()),
            (
                "continueOnFailure".to_string(),
                continue_on_failure.to_string(),
            ),
        ];
        let value = self.post_form(self.object_url(), fields, "deleteTree")?;
        self.cache().clear();
        Ok(decode_failed_ids(&value))
    }

    fn content_stream(&self, id: &str) -> CmisResult<ContentStream> {
        let query = [("cmisselector", "content"), ("objectId", id)];
        let response = self.send(self.http.get(self.object_url()).query(&query), "content")?;

        let headers = response.headers();
        let mime_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_file_name);

        Ok(ContentStream::new(
            file_name,
            length,
            mime_type,
            Box::new(response),
        ))
    }

    fn all_versions(&self, id: &str, ctx: &OperationContext) -> CmisResult<Vec<Document>> {
        let mut params = Self::fetch_params(ctx);
        params.push(("objectId", id.to_string()));
        let value = self.get_json(self.object_url(), &params, "versions")?;
        Ok(decode_object_array(&value)?
            .into_iter()
            .filter_map(RepositoryObject::into_document)
            .collect())
    }
}

fn content_part(content: ContentStream) -> CmisResult<Part> {
    let file_name = content
        .file_name
        .clone()
        .unwrap_or_else(|| "content".to_string());
    let mime_type = content.mime_type.clone();
    let part = match content.length {
        Some(length) => Part::reader_with_length(content.into_reader(), length),
        None => Part::reader(content.into_reader()),
    };
    Ok(part.file_name(file_name).mime_str(&mime_type)?)
}

/// `attachment; filename="report.pdf"` -> `report.pdf`.
fn disposition_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::disposition_file_name;

    #[test]
    fn disposition_file_name_strips_quotes() {
        assert_eq!(
            disposition_file_name("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(disposition_file_name("inline"), None);
    }
}
