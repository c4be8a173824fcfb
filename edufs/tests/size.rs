use std::mem;

use edufs::layout::{CylinderGroup, Denode, DirSlot, SuperBlock};

#[test]
fn volume() {
    assert_eq!(632, mem::size_of::<SuperBlock>());
    assert_eq!(104, mem::size_of::<CylinderGroup>());
    assert_eq!(256, mem::size_of::<Denode>());
    assert_eq!(32, mem::size_of::<DirSlot>());
}
