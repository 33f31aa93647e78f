use failure::Error;
use std::collections::HashMap;
use std::mem;

use crate::errors::RunError;
use crate::values::Value;

/// handle to a frame in `Scopes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// one lexical frame: its own bindings plus the frame it was opened in
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub vars: HashMap<String, Value>,
    pub parent: Option<ScopeId>,
    /// a closure or promise refers to this frame (or to one below it)
    pub captured: bool,
}

/// The “memory” of the interpreter. Every frame lives in one arena and
/// refers to its parent by index, so closures can hold on to any ancestor
/// frame without reference cycles or borrow juggling. A call frame that
/// nothing captured is released when the call returns and its slot is
/// reused by the next `child`.
#[derive(Debug, Clone)]
pub struct Scopes {
    frames: Vec<Frame>,
    free: Vec<usize>,
}

impl Scopes {
    /// create an arena holding a single, empty root frame
    pub fn new() -> Scopes {
        Scopes {
            frames: vec![Frame::default()],
            free: Vec::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// open a new, empty frame below `parent`
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let frame = Frame {
            vars: HashMap::new(),
            parent: Some(parent),
            captured: false,
        };
        match self.free.pop() {
            Some(index) => {
                self.frames[index] = frame;
                ScopeId(index)
            }
            None => {
                self.frames.push(frame);
                ScopeId(self.frames.len() - 1)
            }
        }
    }

    /// keep `scope` and all of its ancestors alive for good
    pub fn capture(&mut self, scope: ScopeId) {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = &mut self.frames[id.0];
            if frame.captured {
                // its ancestors were marked along with it
                return;
            }
            frame.captured = true;
            current = frame.parent;
        }
    }

    /// drop the bindings of a frame nothing captured and recycle its slot.
    /// returns whether the frame was released
    pub fn release(&mut self, scope: ScopeId) -> bool {
        let frame = &mut self.frames[scope.0];
        if frame.captured || frame.parent.is_none() {
            return false;
        }
        let vars = mem::replace(&mut frame.vars, HashMap::new());
        frame.parent = None;
        self.free.push(scope.0);
        drop(vars);
        true
    }

    /// how many frames are currently in use
    pub fn live(&self) -> usize {
        self.frames.len() - self.free.len()
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.frames[scope.0].parent
    }

    /// resolve an identifier, walking outwards through the parents
    pub fn get(&self, scope: ScopeId, name: &str) -> Result<Value, Error> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = &self.frames[id.0];
            if let Some(value) = frame.vars.get(name) {
                return Ok(value.clone());
            }
            current = frame.parent;
        }
        Err(RunError::NotInScope(name.to_owned()).into())
    }

    /// add (or modify) a binding in this frame only
    pub fn set(&mut self, scope: ScopeId, name: &str, value: Value) {
        self.frames[scope.0].vars.insert(name.to_owned(), value);
    }

    /// whether this frame (not its parents) binds `name`
    pub fn has(&self, scope: ScopeId, name: &str) -> bool {
        self.frames[scope.0].vars.contains_key(name)
    }

    /// overwrite the nearest enclosing binding of `name`; when no frame binds
    /// it, define it in the outermost frame. returns whether a binding existed
    pub fn set_recursive(&mut self, scope: ScopeId, name: &str, value: Value) -> bool {
        let mut current = scope;
        loop {
            if self.has(current, name) {
                self.set(current, name, value);
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => {
                    self.set(current, name, value);
                    return false;
                }
            }
        }
    }

    /// the names bound directly in this frame
    pub fn identifiers(&self, scope: ScopeId) -> Vec<&str> {
        let mut names: Vec<&str> = self.frames[scope.0].vars.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for Scopes {
    fn default() -> Scopes {
        Scopes::new()
    }
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::Value::Integer;

    #[test]
    fn set_recursive_updates_the_enclosing_binding() {
        let mut scopes = Scopes::new();
        let parent = scopes.root();
        scopes.set(parent, "foo", Integer(10));
        scopes.set(parent, "bar", Integer(20));

        let child = scopes.child(parent);
        scopes.set(child, "foo", Integer(15));
        assert!(scopes.set_recursive(child, "bar", Integer(25)));

        assert_eq!(Integer(10), scopes.get(parent, "foo").unwrap());
        assert_eq!(Integer(25), scopes.get(parent, "bar").unwrap());
        assert_eq!(Integer(15), scopes.get(child, "foo").unwrap());
        assert!(!scopes.has(child, "bar"));
        assert!(scopes.get(child, "baz").is_err());
    }

    #[test]
    fn set_recursive_defines_missing_names_at_the_root() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let middle = scopes.child(root);
        let inner = scopes.child(middle);

        assert!(!scopes.set_recursive(inner, "x", Integer(1)));
        assert!(scopes.has(root, "x"));
        assert!(!scopes.has(middle, "x"));
        assert!(!scopes.has(inner, "x"));
    }

    #[test]
    fn set_shadows_instead_of_overwriting() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        scopes.set(root, "x", Integer(1));
        let child = scopes.child(root);
        scopes.set(child, "x", Integer(2));

        assert_eq!(Integer(2), scopes.get(child, "x").unwrap());
        assert_eq!(Integer(1), scopes.get(root, "x").unwrap());
        assert_eq!(vec!["x"], scopes.identifiers(child));
    }

    #[test]
    fn released_frames_are_reused() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let first = scopes.child(root);
        scopes.set(first, "x", Integer(1));

        assert!(scopes.release(first));
        assert!(!scopes.release(first));
        assert_eq!(1, scopes.live());

        let second = scopes.child(root);
        assert_eq!(first, second);
        assert!(!scopes.has(second, "x"));
        assert_eq!(Some(root), scopes.parent(second));
    }

    #[test]
    fn captured_frames_and_their_parents_stay() {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        let outer = scopes.child(root);
        let inner = scopes.child(outer);
        scopes.set(outer, "x", Integer(1));

        scopes.capture(inner);
        assert!(!scopes.release(inner));
        assert!(!scopes.release(outer));
        assert!(!scopes.release(root));
        assert_eq!(Integer(1), scopes.get(inner, "x").unwrap());
        assert_eq!(3, scopes.live());
    }

    #[test]
    fn missing_identifiers_name_themselves() {
        let scopes = Scopes::new();
        let err = scopes.get(scopes.root(), "nope").unwrap_err();
        assert_eq!("identifier 'nope' is not in scope", err.to_string());
    }
}
// }}}
