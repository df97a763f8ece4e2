//! The template list, stored as one JSON array under [`TEMPLATES_KEY`].

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::KvError;
use crate::template::{ElementRecord, Template};

use super::KeyValueStorage;

pub const TEMPLATES_KEY: &str = "kvTemplates";

/// CRUD over the persisted template list. List order carries no meaning.
///
/// Every change is a read-modify-write of the whole list, done under one
/// lock shared by all clones of the store.
#[derive(Clone)]
pub struct TemplateStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl TemplateStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, KvError> {
        self.write_lock
            .lock()
            .map_err(|_| KvError::Storage("Template store lock poisoned".to_string()))
    }

    pub fn list(&self) -> Result<Vec<Template>, KvError> {
        match self.storage.get_item(TEMPLATES_KEY)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| KvError::Storage(format!("Corrupt template list: {}", e))),
        }
    }

    pub fn get(&self, id: &str) -> Result<Template, KvError> {
        self.list()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| KvError::Input(format!("Unknown template '{}'", id)))
    }

    /// Append a new template. An id already in use is replaced by the next
    /// free one, so saves within the same millisecond all land.
    pub fn insert(&self, mut template: Template) -> Result<Template, KvError> {
        let _guard = self.lock()?;
        let mut templates = self.list()?;
        let id = free_id(&templates, &template.id);
        if id != template.id {
            debug!(requested = %template.id, assigned = %id, "template id taken");
            template.id = id;
        }
        templates.push(template.clone());
        self.write(&templates)?;
        info!(id = %template.id, name = %template.name, "template saved");
        Ok(template)
    }

    /// Replace an existing template's elements and stamp `lastUpdated`.
    pub fn update_elements(&self, id: &str, elements: Vec<ElementRecord>) -> Result<Template, KvError> {
        self.modify(id, |t| t.elements = elements)
    }

    /// Replace name, description and elements of an existing template.
    pub fn update(&self, template: Template) -> Result<Template, KvError> {
        let id = template.id.clone();
        self.modify(&id, move |t| {
            t.name = template.name;
            t.description = template.description;
            t.elements = template.elements;
        })
    }

    /// Returns whether a template was removed.
    pub fn delete(&self, id: &str) -> Result<bool, KvError> {
        let _guard = self.lock()?;
        let mut templates = self.list()?;
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Ok(false);
        }
        self.write(&templates)?;
        info!(id, "template deleted");
        Ok(true)
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut Template)) -> Result<Template, KvError> {
        let _guard = self.lock()?;
        let mut templates = self.list()?;
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| KvError::Input(format!("Unknown template '{}'", id)))?;
        f(template);
        template.last_updated = Some(Utc::now());
        let updated = template.clone();
        self.write(&templates)?;
        info!(id, "template updated");
        Ok(updated)
    }

    fn write(&self, templates: &[Template]) -> Result<(), KvError> {
        let raw = serde_json::to_string(templates)?;
        self.storage.set_item(TEMPLATES_KEY, &raw)
    }
}

/// `wanted` if unused, else the next unused numeric id after it.
fn free_id(templates: &[Template], wanted: &str) -> String {
    let taken = |id: &str| templates.iter().any(|t| t.id == id);
    if !wanted.is_empty() && !taken(wanted) {
        return wanted.to_string();
    }
    let mut n = wanted
        .parse::<i64>()
        .unwrap_or_else(|_| Utc::now().timestamp_millis());
    loop {
        n += 1;
        let id = n.to_string();
        if !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> TemplateStore {
        TemplateStore::new(Arc::new(MemoryStorage::new()))
    }

    fn template(id: &str) -> Template {
        let mut t = Template::new("Oferta", "", vec![]);
        t.id = id.to_string();
        t
    }

    #[test]
    fn test_empty_list() {
        assert!(store().list().unwrap().is_empty());
    }

    #[test]
    fn test_insert_get_delete() {
        let s = store();
        s.insert(template("1")).unwrap();
        s.insert(template("2")).unwrap();
        assert_eq!(s.list().unwrap().len(), 2);
        assert_eq!(s.get("2").unwrap().id, "2");
        assert!(s.delete("1").unwrap());
        assert!(!s.delete("1").unwrap());
        assert!(matches!(s.get("1"), Err(KvError::Input(_))));
    }

    #[test]
    fn test_taken_id_gets_next_free_one() {
        let s = store();
        s.insert(template("1")).unwrap();
        s.insert(template("2")).unwrap();
        let third = s.insert(template("1")).unwrap();
        assert_eq!(third.id, "3");
        assert_eq!(s.list().unwrap().len(), 3);
    }

    #[test]
    fn test_saves_in_a_tight_loop_all_land() {
        let s = store();
        for i in 0..50 {
            s.insert(Template::new(&format!("t{}", i), "", vec![])).unwrap();
        }
        let mut ids: Vec<String> = s.list().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 50);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_concurrent_inserts_are_all_persisted() {
        let s = store();
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let s = s.clone();
                scope.spawn(move || {
                    for i in 0..20 {
                        s.insert(Template::new(&format!("w{}-{}", worker, i), "", vec![]))
                            .unwrap();
                    }
                });
            }
        });
        let templates = s.list().unwrap();
        assert_eq!(templates.len(), 160);
        assert!(templates.iter().any(|t| t.name == "w7-19"));
    }

    #[test]
    fn test_concurrent_updates_keep_every_change() {
        let s = store();
        for i in 0..8 {
            s.insert(template(&i.to_string())).unwrap();
        }
        std::thread::scope(|scope| {
            for i in 0..8 {
                let s = s.clone();
                scope.spawn(move || {
                    let rec = ElementRecord {
                        kind: "text".into(),
                        text: Some(format!("R$ {},00", i)),
                        ..Default::default()
                    };
                    s.update_elements(&i.to_string(), vec![rec]).unwrap();
                });
            }
        });
        for t in s.list().unwrap() {
            assert_eq!(t.elements.len(), 1, "template {}", t.id);
        }
    }

    #[test]
    fn test_update_sets_last_updated() {
        let s = store();
        s.insert(template("1")).unwrap();
        let rec = ElementRecord {
            kind: "text".into(),
            text: Some("R$ 1,00".into()),
            ..Default::default()
        };
        let updated = s.update_elements("1", vec![rec]).unwrap();
        assert!(updated.last_updated.is_some());
        assert_eq!(s.get("1").unwrap().elements.len(), 1);
    }

    #[test]
    fn test_corrupt_list() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TEMPLATES_KEY, "not json").unwrap();
        let s = TemplateStore::new(storage);
        assert!(matches!(s.list(), Err(KvError::Storage(_))));
    }
}
