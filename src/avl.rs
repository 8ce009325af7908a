/// `AvlMap` is an ordered map similar to [`std::collections::BTreeMap`], backed by a
/// height-balanced binary search tree whose nodes carry parent links.
///
/// General guide to implementation:
///
/// [`AvlMap`] has a length, a comparator and a root [`Link`], where a `Link` is an optional
/// pointer to a heap-allocated `Node`. The `left` and `right` links of a node are the owning
/// edges; the `parent` link is a non-owning back pointer used for cursor stepping and for
/// rebalancing, never for deallocation.
///
/// Insertion and deletion are recursive over the owning slot (`&mut Link`), with heights
/// recomputed and rotations applied on the return path. Deletion reports whether a subtree
/// lost height via [`Outcome`], so rebalancing stops as soon as an ancestor absorbs the
/// height change.
///
/// [`CursorMut`] holds a raw pointer to the map (it is created from a mutable borrow), the
/// rest of the crate uses ordinary borrows. Roughly speaking, unsafe code is limited to
/// node access through [`NonNull`] and the pointer surgery in rotation and deletion.
pub struct AvlMap<K, V, C = NaturalOrder> {
    len: usize,
    root: Link<K, V>,
    cmp: C,
}

unsafe impl<K: Send, V: Send, C: Send> Send for AvlMap<K, V, C> {}
unsafe impl<K: Sync, V: Sync, C: Sync> Sync for AvlMap<K, V, C> {}

impl<K, V, C: Default> Default for AvlMap<K, V, C> {
    fn default() -> Self {
        Self {
            len: 0,
            root: None,
            cmp: C::default(),
        }
    }
}

impl<K, V> AvlMap<K, V> {
    /// Returns a new, empty map ordered by [`NaturalOrder`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<K, V, C> AvlMap<K, V, C> {
    /// Returns a new, empty map ordered by the supplied comparator.
    #[must_use]
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            len: 0,
            root: None,
            cmp,
        }
    }

    /// Get number of key-value pairs in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the map empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear the map, deallocating every node.
    pub fn clear(&mut self) {
        destroy_subtree(self.root.take());
        self.len = 0;
    }

    /// Get a reference to the value for the specified key.
    pub fn get(&self, key: &K) -> Option<&V>
    where
        C: Comparator<K>,
    {
        self.find_node(key)
            .map(|n| unsafe { &(*n.as_ptr()).value })
    }

    /// Get a mutable reference to the value for the specified key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V>
    where
        C: Comparator<K>,
    {
        self.find_node(key)
            .map(|n| unsafe { &mut (*n.as_ptr()).value })
    }

    /// Get references to the key and value for the specified key.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)>
    where
        C: Comparator<K>,
    {
        self.find_node(key)
            .map(|n| unsafe { (&(*n.as_ptr()).key, &(*n.as_ptr()).value) })
    }

    /// Does the map have an entry for the specified key.
    pub fn contains_key(&self, key: &K) -> bool
    where
        C: Comparator<K>,
    {
        self.find_node(key).is_some()
    }

    /// Get a reference to the value for the specified key, failing with
    /// [`KeyNotFoundError`] if the key is absent.
    pub fn at(&self, key: &K) -> Result<&V, KeyNotFoundError>
    where
        C: Comparator<K>,
    {
        self.get(key).ok_or(KeyNotFoundError {})
    }

    /// Get a mutable reference to the value for the specified key, failing with
    /// [`KeyNotFoundError`] if the key is absent.
    pub fn at_mut(&mut self, key: &K) -> Result<&mut V, KeyNotFoundError>
    where
        C: Comparator<K>,
    {
        self.get_mut(key).ok_or(KeyNotFoundError {})
    }

    /// Get references to the first (least) key and its value.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        leftmost(self.root).map(|n| unsafe { (&(*n.as_ptr()).key, &(*n.as_ptr()).value) })
    }

    /// Get references to the last (greatest) key and its value.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        rightmost(self.root).map(|n| unsafe { (&(*n.as_ptr()).key, &(*n.as_ptr()).value) })
    }

    /// Insert a key-value pair if the key is not already present.
    ///
    /// Returns a cursor to the node for the key and `true` if the pair was newly added.
    /// If the key was already present the existing value is left untouched and the
    /// second result is `false`.
    pub fn insert(&mut self, key: K, value: V) -> (CursorMut<'_, K, V, C>, bool)
    where
        C: Comparator<K>,
    {
        let (node, added) = self.insert_internal(key, value);
        let cursor = CursorMut {
            pos: Some(node),
            map: self,
            seen_end: false,
            _marker: PhantomData,
        };
        (cursor, added)
    }

    /// Get Entry for map key.
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, C>
    where
        C: Comparator<K>,
    {
        match self.find_node(&key) {
            Some(node) => Entry::Occupied(OccupiedEntry {
                node,
                _marker: PhantomData,
            }),
            None => Entry::Vacant(VacantEntry { key, map: self }),
        }
    }

    /// Remove key-value pair from map, returning just the value.
    pub fn remove(&mut self, key: &K) -> Option<V>
    where
        C: Comparator<K>,
    {
        self.remove_entry(key).map(|(_k, v)| v)
    }

    /// Remove key-value pair from map.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)>
    where
        C: Comparator<K>,
    {
        let (removed, _) = remove_node(&self.cmp, &mut self.root, key);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Remove first key-value pair from map.
    pub fn pop_first(&mut self) -> Option<(K, V)>
    where
        C: Comparator<K>,
    {
        let node = leftmost(self.root)?;
        unsafe {
            let key: *const K = &(*node.as_ptr()).key;
            let (removed, _) = remove_node(&self.cmp, &mut self.root, &*key);
            if removed.is_some() {
                self.len -= 1;
            }
            removed
        }
    }

    /// Remove last key-value pair from map.
    pub fn pop_last(&mut self) -> Option<(K, V)>
    where
        C: Comparator<K>,
    {
        let node = rightmost(self.root)?;
        unsafe {
            let key: *const K = &(*node.as_ptr()).key;
            let (removed, _) = remove_node(&self.cmp, &mut self.root, &*key);
            if removed.is_some() {
                self.len -= 1;
            }
            removed
        }
    }

    /// Remove the element a [`Position`] denotes.
    ///
    /// Fails with [`InvalidCursorError`] if the position was obtained from a different
    /// map instance, denotes the end sentinel, or no longer denotes a live element.
    /// A rejected call leaves the map untouched. Validation never dereferences the
    /// handle, so even a stale position is safe to pass.
    pub fn remove_at(&mut self, pos: Position<K, V, C>) -> Result<(K, V), InvalidCursorError>
    where
        C: Comparator<K>,
    {
        if !std::ptr::eq(pos.map, self) {
            return Err(InvalidCursorError {});
        }
        let Some(node) = pos.node else {
            return Err(InvalidCursorError {});
        };
        if !self.contains_node(node) {
            return Err(InvalidCursorError {});
        }
        unsafe {
            let key: *const K = &(*node.as_ptr()).key;
            let (removed, _) = remove_node(&self.cmp, &mut self.root, &*key);
            match removed {
                Some(kv) => {
                    self.len -= 1;
                    Ok(kv)
                }
                None => Err(InvalidCursorError {}),
            }
        }
    }

    /// Get a cursor positioned at the specified key, or at the end sentinel if the
    /// key is absent.
    pub fn find(&self, key: &K) -> Cursor<'_, K, V, C>
    where
        C: Comparator<K>,
    {
        Cursor {
            pos: self.find_node(key),
            map: self,
            seen_end: false,
        }
    }

    /// Get a mutable cursor positioned at the specified key, or at the end sentinel
    /// if the key is absent.
    pub fn find_mut(&mut self, key: &K) -> CursorMut<'_, K, V, C>
    where
        C: Comparator<K>,
    {
        let pos = self.find_node(key);
        CursorMut {
            pos,
            map: self,
            seen_end: false,
            _marker: PhantomData,
        }
    }

    /// Get a cursor positioned at the first (least) key.
    /// On an empty map this is the end sentinel.
    pub fn cursor_front(&self) -> Cursor<'_, K, V, C> {
        Cursor {
            pos: leftmost(self.root),
            map: self,
            seen_end: false,
        }
    }

    /// Get a cursor positioned at the last (greatest) key.
    /// On an empty map this is the end sentinel.
    pub fn cursor_back(&self) -> Cursor<'_, K, V, C> {
        Cursor {
            pos: rightmost(self.root),
            map: self,
            seen_end: false,
        }
    }

    /// Get a cursor at the end sentinel, one past the greatest key.
    /// A fresh end cursor cannot be stepped backwards, see [`Cursor::move_prev`].
    pub fn cursor_end(&self) -> Cursor<'_, K, V, C> {
        Cursor {
            pos: None,
            map: self,
            seen_end: false,
        }
    }

    /// Get a mutable cursor positioned at the first (least) key.
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, K, V, C> {
        let pos = leftmost(self.root);
        CursorMut {
            pos,
            map: self,
            seen_end: false,
            _marker: PhantomData,
        }
    }

    /// Get a mutable cursor positioned at the last (greatest) key.
    pub fn cursor_back_mut(&mut self) -> CursorMut<'_, K, V, C> {
        let pos = rightmost(self.root);
        CursorMut {
            pos,
            map: self,
            seen_end: false,
            _marker: PhantomData,
        }
    }

    /// Get a mutable cursor at the end sentinel.
    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, K, V, C> {
        CursorMut {
            pos: None,
            map: self,
            seen_end: false,
            _marker: PhantomData,
        }
    }

    /// Get an iterator over the key-value pairs in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            front: leftmost(self.root),
            back: rightmost(self.root),
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Get an iterator over the key-value pairs with mutable value references.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            front: leftmost(self.root),
            back: rightmost(self.root),
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Get an iterator over the keys in ascending order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    /// Get an iterator over the values, ordered by key.
    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    /// Get an iterator over mutable value references, ordered by key.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut(self.iter_mut())
    }

    /// Iterative descent by comparator, first node whose key is equivalent.
    fn find_node(&self, key: &K) -> Link<K, V>
    where
        C: Comparator<K>,
    {
        let mut p = self.root;
        while let Some(node) = p {
            p = unsafe {
                match self.cmp.cmp(key, &(*node.as_ptr()).key) {
                    Ordering::Less => (*node.as_ptr()).left,
                    Ordering::Greater => (*node.as_ptr()).right,
                    Ordering::Equal => return Some(node),
                }
            };
        }
        None
    }

    fn insert_internal(&mut self, key: K, value: V) -> (NodePtr<K, V>, bool)
    where
        C: Comparator<K>,
    {
        let (node, added) = insert_at(&self.cmp, &mut self.root, None, key, value);
        if added {
            self.len += 1;
        }
        (node, added)
    }

    /// Address-only sweep, safe for pointers that may no longer be live.
    fn contains_node(&self, target: NodePtr<K, V>) -> bool {
        let mut stack = StkVec::new();
        if let Some(root) = self.root {
            stack.push(root);
        }
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            unsafe {
                if let Some(l) = (*node.as_ptr()).left {
                    stack.push(l);
                }
                if let Some(r) = (*node.as_ptr()).right {
                    stack.push(r);
                }
            }
        }
        false
    }
}

impl<K, V, C> Drop for AvlMap<K, V, C> {
    fn drop(&mut self) {
        destroy_subtree(self.root.take());
    }
}

impl<K, V, C> IntoIterator for AvlMap<K, V, C>
where
    C: Comparator<K>,
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, C>;

    /// Convert `AvlMap` to [`IntoIter`].
    fn into_iter(self) -> IntoIter<K, V, C> {
        IntoIter { map: self }
    }
}
impl<'a, K, V, C> IntoIterator for &'a AvlMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
impl<'a, K, V, C> IntoIterator for &'a mut AvlMap<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}
impl<K, V, C> Clone for AvlMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Clone,
{
    /// Structural deep copy. Heights are carried over and parent links re-established,
    /// so no rebalancing work is done and the two maps share no node.
    fn clone(&self) -> AvlMap<K, V, C> {
        AvlMap {
            len: self.len,
            root: clone_subtree(self.root),
            cmp: self.cmp.clone(),
        }
    }
}
impl<K, V, C> FromIterator<(K, V)> for AvlMap<K, V, C>
where
    C: Comparator<K> + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> AvlMap<K, V, C> {
        let mut map = AvlMap::default();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
impl<K, V, const N: usize> From<[(K, V); N]> for AvlMap<K, V>
where
    K: Ord,
{
    fn from(arr: [(K, V); N]) -> AvlMap<K, V> {
        let mut map = AvlMap::new();
        for (k, v) in arr {
            map.insert(k, v);
        }
        map
    }
}
impl<K, V, C> Extend<(K, V)> for AvlMap<K, V, C>
where
    C: Comparator<K>,
{
    fn extend<T>(&mut self, iter: T)
    where
        T: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}
impl<K, V, C> std::ops::Index<&K> for AvlMap<K, V, C>
where
    C: Comparator<K>,
{
    type Output = V;

    /// Returns a reference to the value corresponding to the supplied key.
    ///
    /// Panics if the key is not present in the `AvlMap`.
    fn index(&self, key: &K) -> &V {
        self.get(key).expect("no entry found for key")
    }
}
impl<K: Debug, V: Debug, C> Debug for AvlMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize,
};

#[cfg(feature = "serde")]
impl<K, V, C> Serialize for AvlMap<K, V, C>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct AvlMapVisitor<K, V, C> {
    marker: PhantomData<fn() -> AvlMap<K, V, C>>,
}

#[cfg(feature = "serde")]
impl<K, V, C> AvlMapVisitor<K, V, C> {
    fn new() -> Self {
        AvlMapVisitor {
            marker: PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, C> Visitor<'de> for AvlMapVisitor<K, V, C>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
    C: Comparator<K> + Default,
{
    type Value = AvlMap<K, V, C>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("AvlMap")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut map = AvlMap::default();
        while let Some((k, v)) = access.next_entry()? {
            map.insert(k, v);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, C> Deserialize<'de> for AvlMap<K, V, C>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
    C: Comparator<K> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(AvlMapVisitor::new())
    }
}

use std::{
    cmp::Ordering,
    fmt,
    fmt::Debug,
    iter::FusedIterator,
    marker::PhantomData,
    mem,
    ptr::NonNull,
};

/// Work stack for iterative tree traversal. An AVL tree with at most `usize::MAX`
/// nodes has height below 1.44 * 64, and the traversals keep at most one pending
/// entry per level, so a fixed capacity suffices.
type StkVec<T> = arrayvec::ArrayVec<T, 96>;

type NodePtr<K, V> = NonNull<Node<K, V>>;
type Link<K, V> = Option<NodePtr<K, V>>;

/// Strict weak ordering over keys. [`Ordering::Equal`] means the two keys are
/// equivalent; the map never holds two equivalent keys.
pub trait Comparator<K: ?Sized> {
    /// Compare two keys.
    fn cmp(&self, a: &K, b: &K) -> Ordering;
}

/// Default comparator, ascending [`Ord`] order.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> Comparator<K> for NaturalOrder {
    fn cmp(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Error returned by [`AvlMap::at`] and [`AvlMap::at_mut`] for a key that is not present.
#[derive(Debug, Clone)]
pub struct KeyNotFoundError {}

/// Error returned by cursor navigation, [`CursorMut::remove_current`] and
/// [`AvlMap::remove_at`] for a position that does not denote a live element of the
/// map it is applied to.
#[derive(Debug, Clone)]
pub struct InvalidCursorError {}

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    parent: Link<K, V>,
    height: usize,
}

impl<K, V> Node<K, V> {
    fn alloc(key: K, value: V, parent: Link<K, V>) -> NodePtr<K, V> {
        NonNull::from(Box::leak(Box::new(Node {
            key,
            value,
            left: None,
            right: None,
            parent,
            height: 1,
        })))
    }
}

fn height<K, V>(link: Link<K, V>) -> usize {
    match link {
        Some(node) => unsafe { (*node.as_ptr()).height },
        None => 0,
    }
}

/// Height difference of the children, positive when the left side is taller.
unsafe fn balance<K, V>(node: NodePtr<K, V>) -> isize {
    let n = node.as_ptr();
    height((*n).left) as isize - height((*n).right) as isize
}

unsafe fn update_height<K, V>(node: NodePtr<K, V>) {
    let n = node.as_ptr();
    (*n).height = height((*n).left).max(height((*n).right)) + 1;
}

fn leftmost<K, V>(link: Link<K, V>) -> Link<K, V> {
    let mut node = link?;
    unsafe {
        while let Some(l) = (*node.as_ptr()).left {
            node = l;
        }
    }
    Some(node)
}

fn rightmost<K, V>(link: Link<K, V>) -> Link<K, V> {
    let mut node = link?;
    unsafe {
        while let Some(r) = (*node.as_ptr()).right {
            node = r;
        }
    }
    Some(node)
}

/// Next node in key order: leftmost of the right subtree, else the first ancestor
/// reached through a left-child edge.
unsafe fn successor<K, V>(node: NodePtr<K, V>) -> Link<K, V> {
    if let Some(right) = (*node.as_ptr()).right {
        return leftmost(Some(right));
    }
    let mut cur = node;
    let mut up = (*node.as_ptr()).parent;
    while let Some(p) = up {
        if (*p.as_ptr()).right != Some(cur) {
            break;
        }
        cur = p;
        up = (*p.as_ptr()).parent;
    }
    up
}

/// Mirror of [`successor`].
unsafe fn predecessor<K, V>(node: NodePtr<K, V>) -> Link<K, V> {
    if let Some(left) = (*node.as_ptr()).left {
        return rightmost(Some(left));
    }
    let mut cur = node;
    let mut up = (*node.as_ptr()).parent;
    while let Some(p) = up {
        if (*p.as_ptr()).left != Some(cur) {
            break;
        }
        cur = p;
        up = (*p.as_ptr()).parent;
    }
    up
}

/// Post-order deallocation with an explicit work stack.
fn destroy_subtree<K, V>(root: Link<K, V>) {
    let mut stack = StkVec::new();
    if let Some(node) = root {
        stack.push(node);
    }
    while let Some(node) = stack.pop() {
        let boxed = unsafe { Box::from_raw(node.as_ptr()) };
        if let Some(l) = boxed.left {
            stack.push(l);
        }
        if let Some(r) = boxed.right {
            stack.push(r);
        }
    }
}

/// Clone a subtree, carrying heights over and re-linking parents.
fn clone_subtree<K: Clone, V: Clone>(root: Link<K, V>) -> Link<K, V> {
    unsafe fn clone_one<K: Clone, V: Clone>(src: NodePtr<K, V>, parent: Link<K, V>) -> NodePtr<K, V> {
        let s = src.as_ptr();
        NonNull::from(Box::leak(Box::new(Node {
            key: (*s).key.clone(),
            value: (*s).value.clone(),
            left: None,
            right: None,
            parent,
            height: (*s).height,
        })))
    }
    let src_root = root?;
    unsafe {
        let new_root = clone_one(src_root, None);
        let mut stack: StkVec<(NodePtr<K, V>, NodePtr<K, V>)> = StkVec::new();
        stack.push((src_root, new_root));
        while let Some((src, dst)) = stack.pop() {
            if let Some(l) = (*src.as_ptr()).left {
                let c = clone_one(l, Some(dst));
                (*dst.as_ptr()).left = Some(c);
                stack.push((l, c));
            }
            if let Some(r) = (*src.as_ptr()).right {
                let c = clone_one(r, Some(dst));
                (*dst.as_ptr()).right = Some(c);
                stack.push((r, c));
            }
        }
        Some(new_root)
    }
}

// Rotations operate through the owning slot: the slot ends up holding the promoted
// child, with parent pointers and heights of the two touched nodes fixed up.

/// Right rotation, for a subtree whose left side is too tall.
fn rotate_right<K, V>(link: &mut Link<K, V>) {
    unsafe {
        let x = link.unwrap().as_ptr();
        let y = (*x).left.unwrap().as_ptr();
        (*x).left = (*y).right;
        if let Some(t) = (*y).right {
            (*t.as_ptr()).parent = NonNull::new(x);
        }
        (*y).right = NonNull::new(x);
        (*y).parent = (*x).parent;
        (*x).parent = NonNull::new(y);
        update_height(NonNull::new_unchecked(x));
        update_height(NonNull::new_unchecked(y));
        *link = NonNull::new(y);
    }
}

/// Left rotation, for a subtree whose right side is too tall.
fn rotate_left<K, V>(link: &mut Link<K, V>) {
    unsafe {
        let x = link.unwrap().as_ptr();
        let y = (*x).right.unwrap().as_ptr();
        (*x).right = (*y).left;
        if let Some(t) = (*y).left {
            (*t.as_ptr()).parent = NonNull::new(x);
        }
        (*y).left = NonNull::new(x);
        (*y).parent = (*x).parent;
        (*x).parent = NonNull::new(y);
        update_height(NonNull::new_unchecked(x));
        update_height(NonNull::new_unchecked(y));
        *link = NonNull::new(y);
    }
}

/// Double rotation for the left-right case.
fn rotate_left_right<K, V>(link: &mut Link<K, V>) {
    unsafe {
        let node = link.unwrap();
        rotate_left(&mut (*node.as_ptr()).left);
    }
    rotate_right(link);
}

/// Double rotation for the right-left case.
fn rotate_right_left<K, V>(link: &mut Link<K, V>) {
    unsafe {
        let node = link.unwrap();
        rotate_right(&mut (*node.as_ptr()).right);
    }
    rotate_left(link);
}

/// Recursive insert-if-absent. Returns the node for the key and whether it was
/// newly added. On the return path the current subtree is rebalanced if the
/// insertion below pushed its balance factor to plus or minus two; the single
/// versus double rotation case is decided by comparing the inserted key against
/// the key of the unbalanced child.
fn insert_at<K, V, C: Comparator<K>>(
    cmp: &C,
    link: &mut Link<K, V>,
    parent: Link<K, V>,
    key: K,
    value: V,
) -> (NodePtr<K, V>, bool) {
    let Some(node) = *link else {
        let new = Node::alloc(key, value, parent);
        *link = Some(new);
        return (new, true);
    };
    unsafe {
        let n = node.as_ptr();
        match cmp.cmp(&key, &(*n).key) {
            Ordering::Less => {
                let (pos, added) = insert_at(cmp, &mut (*n).left, Some(node), key, value);
                if added && balance(node) == 2 {
                    let left = (*n).left.unwrap();
                    if cmp.cmp(&(*pos.as_ptr()).key, &(*left.as_ptr()).key) == Ordering::Less {
                        rotate_right(link);
                    } else {
                        rotate_left_right(link);
                    }
                }
                update_height(link.unwrap());
                (pos, added)
            }
            Ordering::Greater => {
                let (pos, added) = insert_at(cmp, &mut (*n).right, Some(node), key, value);
                if added && balance(node) == -2 {
                    let right = (*n).right.unwrap();
                    if cmp.cmp(&(*right.as_ptr()).key, &(*pos.as_ptr()).key) == Ordering::Less {
                        rotate_left(link);
                    } else {
                        rotate_right_left(link);
                    }
                }
                update_height(link.unwrap());
                (pos, added)
            }
            Ordering::Equal => (node, false),
        }
    }
}

/// Whether a deletion step left the subtree height unchanged or one lower.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Intact,
    Shrunk,
}

/// Which child subtree lost height.
#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Rebalance after the subtree on `side` shrank by one level.
///
/// If the surviving side was already the taller by one, the overall height is
/// unchanged and the shrink signal stops here. If the node was perfectly balanced
/// its height drops and the signal continues. Otherwise the balance factor hit two
/// and a rotation is applied, chosen by the sign of the overweight child's own
/// factor; whether the signal continues is read off the post-rotation factor.
fn adjust<K, V>(link: &mut Link<K, V>, side: Side) -> Outcome {
    unsafe {
        let node = link.unwrap();
        match side {
            Side::Right => match balance(node) {
                1 => Outcome::Intact,
                0 => {
                    (*node.as_ptr()).height -= 1;
                    Outcome::Shrunk
                }
                _ => {
                    let left = (*node.as_ptr()).left.unwrap();
                    if balance(left) < 0 {
                        rotate_left_right(link);
                        Outcome::Shrunk
                    } else {
                        rotate_right(link);
                        if balance(link.unwrap()) == 0 {
                            Outcome::Shrunk
                        } else {
                            Outcome::Intact
                        }
                    }
                }
            },
            Side::Left => match balance(node) {
                -1 => Outcome::Intact,
                0 => {
                    (*node.as_ptr()).height -= 1;
                    Outcome::Shrunk
                }
                _ => {
                    let right = (*node.as_ptr()).right.unwrap();
                    if balance(right) > 0 {
                        rotate_right_left(link);
                        Outcome::Shrunk
                    } else {
                        rotate_left(link);
                        if balance(link.unwrap()) == 0 {
                            Outcome::Shrunk
                        } else {
                            Outcome::Intact
                        }
                    }
                }
            },
        }
    }
}

/// Splice the in-order successor into the position of the two-children node at
/// `*link`, and the node into the successor's old position. This is pointer
/// surgery on whole nodes, not a payload swap, so handles to unrelated nodes
/// stay valid. The immediate-right-child case needs different relinking from
/// the general case. Heights travel with the positions.
unsafe fn swap_with_successor<K, V>(link: &mut Link<K, V>) {
    let node = link.unwrap();
    let t = node.as_ptr();
    let mut succ = (*t).right.unwrap();
    while let Some(l) = (*succ.as_ptr()).left {
        succ = l;
    }
    let s = succ.as_ptr();
    mem::swap(&mut (*t).height, &mut (*s).height);
    if (*t).right == Some(succ) {
        // Successor is the immediate right child.
        let father = (*t).parent;
        let son_l = (*t).left;
        let son_r = (*s).right;
        (*t).parent = Some(succ);
        (*t).left = None;
        (*t).right = son_r;
        (*s).parent = father;
        (*s).left = son_l;
        (*s).right = Some(node);
        if let Some(l) = son_l {
            (*l.as_ptr()).parent = Some(succ);
        }
        if let Some(r) = son_r {
            (*r.as_ptr()).parent = Some(node);
        }
    } else {
        let father = (*s).parent.unwrap();
        let son = (*s).right;
        let old_parent = (*t).parent;
        let son_l = (*t).left;
        let son_r = (*t).right.unwrap();
        (*s).parent = old_parent;
        (*s).left = son_l;
        (*s).right = Some(son_r);
        (*t).left = None;
        (*t).right = son;
        (*t).parent = Some(father);
        if let Some(c) = son {
            (*c.as_ptr()).parent = Some(node);
        }
        // The successor was the leftmost node of the right subtree.
        (*father.as_ptr()).left = Some(node);
        if let Some(l) = son_l {
            (*l.as_ptr()).parent = Some(succ);
        }
        (*son_r.as_ptr()).parent = Some(succ);
    }
    *link = Some(succ);
}

/// Recursive delete by key. Returns the removed pair (if any) and whether the
/// subtree under `link` lost height.
fn remove_node<K, V, C: Comparator<K>>(
    cmp: &C,
    link: &mut Link<K, V>,
    key: &K,
) -> (Option<(K, V)>, Outcome) {
    let Some(node) = *link else {
        return (None, Outcome::Intact);
    };
    unsafe {
        let n = node.as_ptr();
        match cmp.cmp(key, &(*n).key) {
            Ordering::Less => {
                let (removed, out) = remove_node(cmp, &mut (*n).left, key);
                match out {
                    Outcome::Intact => (removed, Outcome::Intact),
                    Outcome::Shrunk => (removed, adjust(link, Side::Left)),
                }
            }
            Ordering::Greater => {
                let (removed, out) = remove_node(cmp, &mut (*n).right, key);
                match out {
                    Outcome::Intact => (removed, Outcome::Intact),
                    Outcome::Shrunk => (removed, adjust(link, Side::Right)),
                }
            }
            Ordering::Equal => {
                if (*n).left.is_none() || (*n).right.is_none() {
                    // Splice the sole child (or nothing) into this slot.
                    let child = if (*n).left.is_some() {
                        (*n).left
                    } else {
                        (*n).right
                    };
                    if let Some(c) = child {
                        (*c.as_ptr()).parent = (*n).parent;
                    }
                    *link = child;
                    let boxed = Box::from_raw(n);
                    (Some((boxed.key, boxed.value)), Outcome::Shrunk)
                } else {
                    // Two children: move the successor up, then delete the key from
                    // the relocated right subtree, where the node now has at most
                    // one child.
                    swap_with_successor(link);
                    let root = link.unwrap();
                    let (removed, out) = remove_node(cmp, &mut (*root.as_ptr()).right, key);
                    match out {
                        Outcome::Intact => (removed, Outcome::Intact),
                        Outcome::Shrunk => (removed, adjust(link, Side::Right)),
                    }
                }
            }
        }
    }
}

/// Entry in `AvlMap`, returned by [`AvlMap::entry`].
pub enum Entry<'a, K, V, C = NaturalOrder> {
    /// Vacant entry - map doesn't yet contain key.
    Vacant(VacantEntry<'a, K, V, C>),
    /// Occupied entry - map already contains key.
    Occupied(OccupiedEntry<'a, K, V, C>),
}
impl<'a, K, V, C> Entry<'a, K, V, C>
where
    C: Comparator<K>,
{
    /// Get reference to entry key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Vacant(e) => e.key(),
            Entry::Occupied(e) => e.key(),
        }
    }

    /// Insert default value if the entry is vacant, returning a mutable reference
    /// to the value. Note that a bare lookup through this method creates the entry.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        match self {
            Entry::Vacant(e) => e.insert(V::default()),
            Entry::Occupied(e) => e.into_mut(),
        }
    }

    /// Insert value if the entry is vacant, returning a mutable reference to the value.
    pub fn or_insert(self, value: V) -> &'a mut V {
        match self {
            Entry::Vacant(e) => e.insert(value),
            Entry::Occupied(e) => e.into_mut(),
        }
    }

    /// Insert the result of `default` if the entry is vacant, returning a mutable
    /// reference to the value.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Vacant(e) => e.insert(default()),
            Entry::Occupied(e) => e.into_mut(),
        }
    }
}

/// Vacant [`Entry`].
pub struct VacantEntry<'a, K, V, C = NaturalOrder> {
    key: K,
    map: &'a mut AvlMap<K, V, C>,
}
impl<'a, K, V, C> VacantEntry<'a, K, V, C>
where
    C: Comparator<K>,
{
    /// Get reference to entry key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Insert value into map returning mutable reference to inserted value.
    pub fn insert(self, value: V) -> &'a mut V {
        let (node, _) = self.map.insert_internal(self.key, value);
        unsafe { &mut (*node.as_ptr()).value }
    }
}

/// Occupied [`Entry`].
pub struct OccupiedEntry<'a, K, V, C = NaturalOrder> {
    node: NodePtr<K, V>,
    _marker: PhantomData<&'a mut AvlMap<K, V, C>>,
}
impl<'a, K, V, C> OccupiedEntry<'a, K, V, C> {
    /// Get reference to entry key.
    pub fn key(&self) -> &K {
        unsafe { &(*self.node.as_ptr()).key }
    }

    /// Get reference to the value.
    pub fn get(&self) -> &V {
        unsafe { &(*self.node.as_ptr()).value }
    }

    /// Get mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut V {
        unsafe { &mut (*self.node.as_ptr()).value }
    }

    /// Get mutable reference to the value, consuming the entry.
    pub fn into_mut(self) -> &'a mut V {
        unsafe { &mut (*self.node.as_ptr()).value }
    }
}

/// Detached weak handle to a map position: a node, the identity of the owning map
/// and the end-sentinel marker. Obtained from [`Cursor::position`] or
/// [`CursorMut::position`] and consumed by [`AvlMap::remove_at`].
///
/// A position is invalidated by removal of the element it denotes and by anything
/// that destroys the whole tree (drop, [`AvlMap::clear`]). [`AvlMap::remove_at`]
/// rejects invalidated and foreign positions without touching the map.
pub struct Position<K, V, C = NaturalOrder> {
    node: Link<K, V>,
    map: *const AvlMap<K, V, C>,
}
impl<K, V, C> Clone for Position<K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K, V, C> Copy for Position<K, V, C> {}
impl<K, V, C> PartialEq for Position<K, V, C> {
    /// Node identity and owning-map identity only.
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && std::ptr::eq(self.map, other.map)
    }
}
impl<K, V, C> Eq for Position<K, V, C> {}

/// Read-only cursor over a map, returned by [`AvlMap::find`], [`AvlMap::cursor_front`],
/// [`AvlMap::cursor_back`] and [`AvlMap::cursor_end`].
///
/// A cursor is either positioned at a node or at a sentinel. The end sentinel keeps
/// track of whether it was reached by stepping past the greatest key; only such a
/// sentinel can be stepped backwards again.
pub struct Cursor<'a, K, V, C = NaturalOrder> {
    pos: Link<K, V>,
    map: &'a AvlMap<K, V, C>,
    seen_end: bool,
}

unsafe impl<'a, K: Sync, V: Sync, C: Sync> Send for Cursor<'a, K, V, C> {}
unsafe impl<'a, K: Sync, V: Sync, C: Sync> Sync for Cursor<'a, K, V, C> {}

impl<'a, K, V, C> Clone for Cursor<'a, K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'a, K, V, C> Copy for Cursor<'a, K, V, C> {}

impl<'a, K, V, C> PartialEq for Cursor<'a, K, V, C> {
    /// Node identity and owning-map identity only. Cursors into different map
    /// instances never compare equal, even at equal keys.
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos && std::ptr::eq(self.map, other.map)
    }
}
impl<'a, K, V, C> Eq for Cursor<'a, K, V, C> {}

impl<'a, K, V, C> Cursor<'a, K, V, C> {
    /// Get reference to the key at the cursor, `None` at a sentinel.
    pub fn key(&self) -> Option<&'a K> {
        self.pos.map(|n| unsafe { &(*n.as_ptr()).key })
    }

    /// Get reference to the value at the cursor, `None` at a sentinel.
    pub fn value(&self) -> Option<&'a V> {
        self.pos.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    /// Get references to the key and value at the cursor, `None` at a sentinel.
    pub fn key_value(&self) -> Option<(&'a K, &'a V)> {
        self.pos
            .map(|n| unsafe { (&(*n.as_ptr()).key, &(*n.as_ptr()).value) })
    }

    /// Is the cursor at a sentinel rather than at a node?
    pub fn is_end(&self) -> bool {
        self.pos.is_none()
    }

    /// Detach a weak [`Position`] handle for the current position.
    pub fn position(&self) -> Position<K, V, C> {
        Position {
            node: self.pos,
            map: self.map,
        }
    }

    /// Step to the next key in ascending order: the leftmost node of the right
    /// subtree if there is one, else up along parent links to the first ancestor
    /// reached through a left-child edge. Stepping past the greatest key parks the
    /// cursor at the end sentinel; stepping an already-parked cursor fails with
    /// [`InvalidCursorError`].
    pub fn move_next(&mut self) -> Result<(), InvalidCursorError> {
        let Some(node) = self.pos else {
            return Err(InvalidCursorError {});
        };
        self.pos = unsafe { successor(node) };
        if self.pos.is_none() {
            self.seen_end = true;
        }
        Ok(())
    }

    /// Step to the previous key, the mirror image of [`Cursor::move_next`].
    ///
    /// On an end sentinel that was reached by stepping past the greatest key this
    /// jumps back to that key. A sentinel that was never reached from a node (a
    /// fresh [`AvlMap::cursor_end`], or one stepped below the least key) fails
    /// with [`InvalidCursorError`].
    pub fn move_prev(&mut self) -> Result<(), InvalidCursorError> {
        match self.pos {
            Some(node) => {
                self.pos = unsafe { predecessor(node) };
                Ok(())
            }
            None if self.seen_end => {
                self.pos = rightmost(self.map.root);
                self.seen_end = false;
                match self.pos {
                    Some(_) => Ok(()),
                    None => Err(InvalidCursorError {}),
                }
            }
            None => Err(InvalidCursorError {}),
        }
    }
}

/// Cursor that allows mutation of the values, returned by [`AvlMap::find_mut`],
/// [`AvlMap::insert`] and the `cursor_*_mut` constructors.
///
/// Holds the map through a raw pointer (it is created from a mutable borrow),
/// mirroring the position semantics of [`Cursor`].
pub struct CursorMut<'a, K, V, C = NaturalOrder> {
    pos: Link<K, V>,
    map: *mut AvlMap<K, V, C>,
    seen_end: bool,
    _marker: PhantomData<&'a mut AvlMap<K, V, C>>,
}

unsafe impl<'a, K: Send, V: Send, C: Send> Send for CursorMut<'a, K, V, C> {}
unsafe impl<'a, K: Sync, V: Sync, C: Sync> Sync for CursorMut<'a, K, V, C> {}

impl<'a, K, V, C> CursorMut<'a, K, V, C> {
    /// Get reference to the key at the cursor, `None` at a sentinel.
    pub fn key(&self) -> Option<&K> {
        self.pos.map(|n| unsafe { &(*n.as_ptr()).key })
    }

    /// Get reference to the value at the cursor, `None` at a sentinel.
    pub fn value(&self) -> Option<&V> {
        self.pos.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    /// Get mutable reference to the value at the cursor, `None` at a sentinel.
    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.pos.map(|n| unsafe { &mut (*n.as_ptr()).value })
    }

    /// Get references to the key and value at the cursor, `None` at a sentinel.
    pub fn key_value(&self) -> Option<(&K, &V)> {
        self.pos
            .map(|n| unsafe { (&(*n.as_ptr()).key, &(*n.as_ptr()).value) })
    }

    /// Is the cursor at a sentinel rather than at a node?
    pub fn is_end(&self) -> bool {
        self.pos.is_none()
    }

    /// Detach a weak [`Position`] handle for the current position.
    pub fn position(&self) -> Position<K, V, C> {
        Position {
            node: self.pos,
            map: self.map as *const AvlMap<K, V, C>,
        }
    }

    /// Step to the next key in ascending order, see [`Cursor::move_next`].
    pub fn move_next(&mut self) -> Result<(), InvalidCursorError> {
        let Some(node) = self.pos else {
            return Err(InvalidCursorError {});
        };
        self.pos = unsafe { successor(node) };
        if self.pos.is_none() {
            self.seen_end = true;
        }
        Ok(())
    }

    /// Step to the previous key, see [`Cursor::move_prev`].
    pub fn move_prev(&mut self) -> Result<(), InvalidCursorError> {
        match self.pos {
            Some(node) => {
                self.pos = unsafe { predecessor(node) };
                Ok(())
            }
            None if self.seen_end => {
                self.pos = rightmost(unsafe { (*self.map).root });
                self.seen_end = false;
                match self.pos {
                    Some(_) => Ok(()),
                    None => Err(InvalidCursorError {}),
                }
            }
            None => Err(InvalidCursorError {}),
        }
    }

    /// Remove the element at the cursor, consuming the cursor.
    /// Fails with [`InvalidCursorError`] at a sentinel, leaving the map untouched.
    pub fn remove_current(self) -> Result<(K, V), InvalidCursorError>
    where
        C: Comparator<K>,
    {
        let Some(node) = self.pos else {
            return Err(InvalidCursorError {});
        };
        unsafe {
            let map = &mut *self.map;
            let key: *const K = &(*node.as_ptr()).key;
            let (removed, _) = remove_node(&map.cmp, &mut map.root, &*key);
            match removed {
                Some(kv) => {
                    map.len -= 1;
                    Ok(kv)
                }
                None => Err(InvalidCursorError {}),
            }
        }
    }
}

/// Iterator returned by [`AvlMap::iter`]. Walks the tree through the parent links,
/// no auxiliary stack.
pub struct Iter<'a, K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    len: usize,
    _marker: PhantomData<&'a (K, V)>,
}

unsafe impl<'a, K: Sync, V: Sync> Send for Iter<'a, K, V> {}
unsafe impl<'a, K: Sync, V: Sync> Sync for Iter<'a, K, V> {}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let node = self.front?;
        self.len -= 1;
        self.front = unsafe { successor(node) };
        unsafe { Some((&(*node.as_ptr()).key, &(*node.as_ptr()).value)) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let node = self.back?;
        self.len -= 1;
        self.back = unsafe { predecessor(node) };
        unsafe { Some((&(*node.as_ptr()).key, &(*node.as_ptr()).value)) }
    }
}
impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {
    fn len(&self) -> usize {
        self.len
    }
}
impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Iterator returned by [`AvlMap::iter_mut`].
pub struct IterMut<'a, K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    len: usize,
    _marker: PhantomData<&'a mut (K, V)>,
}

unsafe impl<'a, K: Sync, V: Send> Send for IterMut<'a, K, V> {}
unsafe impl<'a, K: Sync, V: Sync> Sync for IterMut<'a, K, V> {}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let node = self.front?;
        self.len -= 1;
        self.front = unsafe { successor(node) };
        unsafe { Some((&(*node.as_ptr()).key, &mut (*node.as_ptr()).value)) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}
impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        let node = self.back?;
        self.len -= 1;
        self.back = unsafe { predecessor(node) };
        unsafe { Some((&(*node.as_ptr()).key, &mut (*node.as_ptr()).value)) }
    }
}
impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {
    fn len(&self) -> usize {
        self.len
    }
}
impl<'a, K, V> FusedIterator for IterMut<'a, K, V> {}

/// Consuming iterator returned by [`AvlMap::into_iter`].
pub struct IntoIter<K, V, C = NaturalOrder> {
    map: AvlMap<K, V, C>,
}
impl<K, V, C> Iterator for IntoIter<K, V, C>
where
    C: Comparator<K>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.map.pop_first()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.map.len, Some(self.map.len))
    }
}
impl<K, V, C> DoubleEndedIterator for IntoIter<K, V, C>
where
    C: Comparator<K>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.map.pop_last()
    }
}
impl<K, V, C> ExactSizeIterator for IntoIter<K, V, C>
where
    C: Comparator<K>,
{
    fn len(&self) -> usize {
        self.map.len
    }
}
impl<K, V, C> FusedIterator for IntoIter<K, V, C> where C: Comparator<K> {}

/// Iterator returned by [`AvlMap::keys`].
pub struct Keys<'a, K, V>(Iter<'a, K, V>);
impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<'a, K, V> DoubleEndedIterator for Keys<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(k, _)| k)
    }
}
impl<'a, K, V> ExactSizeIterator for Keys<'a, K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<'a, K, V> FusedIterator for Keys<'a, K, V> {}

/// Iterator returned by [`AvlMap::values`].
pub struct Values<'a, K, V>(Iter<'a, K, V>);
impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<'a, K, V> DoubleEndedIterator for Values<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}
impl<'a, K, V> ExactSizeIterator for Values<'a, K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<'a, K, V> FusedIterator for Values<'a, K, V> {}

/// Iterator returned by [`AvlMap::values_mut`].
pub struct ValuesMut<'a, K, V>(IterMut<'a, K, V>);
impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
impl<'a, K, V> DoubleEndedIterator for ValuesMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, v)| v)
    }
}
impl<'a, K, V> ExactSizeIterator for ValuesMut<'a, K, V> {
    fn len(&self) -> usize {
        self.0.len()
    }
}
impl<'a, K, V> FusedIterator for ValuesMut<'a, K, V> {}

#[cfg(test)]
impl<K, V, C> AvlMap<K, V, C>
where
    C: Comparator<K>,
{
    pub(crate) fn tree_height(&self) -> usize {
        height(self.root)
    }

    /// Walk the whole tree asserting the structural invariants: key order under the
    /// comparator, exact height fields, balance factors within one, parent links
    /// consistent with the child links, and the stored length.
    pub(crate) fn check(&self) {
        unsafe fn walk<K, V, C: Comparator<K>>(cmp: &C, link: Link<K, V>) -> usize {
            let Some(node) = link else {
                return 0;
            };
            let n = node.as_ptr();
            if let Some(l) = (*n).left {
                assert!((*l.as_ptr()).parent == Some(node));
                assert!(cmp.cmp(&(*l.as_ptr()).key, &(*n).key) == Ordering::Less);
            }
            if let Some(r) = (*n).right {
                assert!((*r.as_ptr()).parent == Some(node));
                assert!(cmp.cmp(&(*n).key, &(*r.as_ptr()).key) == Ordering::Less);
            }
            let lh = height((*n).left);
            let rh = height((*n).right);
            assert_eq!((*n).height, lh.max(rh) + 1);
            assert!(lh <= rh + 1 && rh <= lh + 1);
            walk(cmp, (*n).left) + walk(cmp, (*n).right) + 1
        }
        unsafe {
            if let Some(root) = self.root {
                assert!((*root.as_ptr()).parent.is_none());
            }
            assert_eq!(walk(&self.cmp, self.root), self.len);
        }
    }
}
