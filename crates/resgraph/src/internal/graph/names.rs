use crate::internal::common::Map;

/// Interns names (subsystems, resource types) into dense ids.
#[derive(Debug, Clone)]
pub(crate) struct NameMap<Id> {
    names: Vec<String>,
    ids: Map<String, Id>,
}

impl<Id> Default for NameMap<Id> {
    fn default() -> Self {
        NameMap {
            names: Vec::new(),
            ids: Map::default(),
        }
    }
}

impl<Id: Copy + From<usize> + Into<usize> + std::fmt::Display> NameMap<Id> {
    pub fn get_or_allocate_id(&mut self, kind: &str, name: &str) -> Id {
        match self.ids.get(name) {
            Some(&id) => id,
            None => {
                let id = Id::from(self.names.len());
                log::debug!("New {kind} registered '{name}' as {id}");
                self.names.push(name.to_string());
                self.ids.insert(name.to_string(), id);
                id
            }
        }
    }

    #[inline]
    pub fn get_id(&self, name: &str) -> Option<Id> {
        self.ids.get(name).copied()
    }

    #[inline]
    pub fn get_name(&self, id: Id) -> Option<&str> {
        self.names.get(id.into()).map(|name| name.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (Id::from(i), name.as_str()))
    }
}
