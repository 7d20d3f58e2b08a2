//! Geometry service.

pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub struct Segment {
    pub from: Point,
    pub to: Point,
}

pub fn greet(name: &str) -> String {
    format!("Hello, {name}")
}

pub fn sum(a: i64, b: i64) -> Result<i64, String> {
    a.checked_add(b).ok_or_else(|| "overflow".to_owned())
}

/// Length of the segment and the number of points it joins.
pub fn length(segment: Segment) -> (f64, u32) {
    let dx = segment.to.x - segment.from.x;
    let dy = segment.to.y - segment.from.y;
    ((dx * dx + dy * dy).sqrt(), 2)
}

pub fn origin() -> Point {
    Point { x: 0.0, y: 0.0 }
}

pub fn total(values: &[i64]) -> i64 {
    let mut sum = 0;
    for v in values {
        sum += v;
    }
    sum
}

pub fn initial(c: char, counts: std::collections::HashMap<String, u32>) -> String {
    format!("{c}{}", counts.values().sum::<u32>())
}

pub fn reset() {}

fn welcome() -> String {
    greet("visitor")
}
