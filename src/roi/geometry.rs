//! 点在多边形内判定 (射线法, 边界计为内部)
//!
//! 全部使用 i128 整数运算 (i32 坐标差的乘积超出 i64), 边界判定没有浮点误差.

use super::Point;

/// 点是否在闭合多边形内部或边界上
///
/// 多边形顶点按顺序连接, 最后一个顶点隐式连回第一个顶点.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    if polygon.is_empty() {
        return false;
    }

    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        if on_segment(p, a, b) {
            return true;
        }

        let (px, py) = (p.x as i128, p.y as i128);
        let (ax, ay) = (a.x as i128, a.y as i128);
        let (bx, by) = (b.x as i128, b.y as i128);

        // 水平向右射线与边 (a, b) 相交
        if (ay > py) != (by > py) {
            let lhs = (px - ax) * (by - ay);
            let rhs = (py - ay) * (bx - ax);
            let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }
    }
    inside
}

/// 点是否落在线段 [a, b] 上 (含端点)
fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let (px, py) = (p.x as i128, p.y as i128);
    let (ax, ay) = (a.x as i128, a.y as i128);
    let (bx, by) = (b.x as i128, b.y as i128);

    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross != 0 {
        return false;
    }
    px >= ax.min(bx) && px <= ax.max(bx) && py >= ay.min(by) && py <= ay.max(by)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(xs: &[(i32, i32)]) -> Vec<Point> {
        xs.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_square() {
        let square = pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
        assert!(point_in_polygon(Point::new(5, 5), &square));
        assert!(!point_in_polygon(Point::new(15, 5), &square));
        assert!(!point_in_polygon(Point::new(-1, 5), &square));
        assert!(!point_in_polygon(Point::new(5, 11), &square));
    }

    #[test]
    fn test_boundary_is_inside() {
        let square = pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
        // 边上
        assert!(point_in_polygon(Point::new(5, 0), &square));
        assert!(point_in_polygon(Point::new(10, 7), &square));
        // 顶点
        assert!(point_in_polygon(Point::new(10, 10), &square));
        // 隐式闭合边 (0,10) → (0,0)
        assert!(point_in_polygon(Point::new(0, 4), &square));
    }

    #[test]
    fn test_diagonal_edge() {
        let tri = pts(&[(0, 0), (10, 10), (0, 10)]);
        assert!(point_in_polygon(Point::new(3, 3), &tri));
        assert!(point_in_polygon(Point::new(2, 8), &tri));
        assert!(!point_in_polygon(Point::new(8, 2), &tri));
    }

    #[test]
    fn test_concave() {
        // U 形
        let u = pts(&[(0, 0), (3, 0), (3, 8), (7, 8), (7, 0), (10, 0), (10, 10), (0, 10)]);
        assert!(point_in_polygon(Point::new(1, 1), &u));
        assert!(point_in_polygon(Point::new(9, 1), &u));
        assert!(!point_in_polygon(Point::new(5, 4), &u));
        assert!(point_in_polygon(Point::new(5, 9), &u));
    }

    #[test]
    fn test_ray_through_vertex() {
        let diamond = pts(&[(5, 0), (10, 5), (5, 10), (0, 5)]);
        assert!(point_in_polygon(Point::new(5, 5), &diamond));
        assert!(!point_in_polygon(Point::new(-3, 5), &diamond));
        assert!(!point_in_polygon(Point::new(11, 5), &diamond));
    }

    #[test]
    fn test_recorded_road_polygon() {
        let road1 = pts(&[(286, 89), (469, 116), (500, 51), (339, 33), (285, 89)]);
        assert!(point_in_polygon(Point::new(400, 80), &road1));
        assert!(!point_in_polygon(Point::new(100, 100), &road1));
        assert!(!point_in_polygon(Point::new(480, 130), &road1));
    }

    #[test]
    fn test_extreme_coordinates() {
        let (lo, hi) = (i32::MIN, i32::MAX);
        let full = pts(&[(lo, lo), (hi, lo), (hi, hi), (lo, hi)]);
        assert!(point_in_polygon(Point::new(100, 100), &full));
        assert!(point_in_polygon(Point::new(hi, 0), &full));
        assert!(point_in_polygon(Point::new(lo, lo), &full));

        let tri = pts(&[(lo, lo), (hi, hi), (lo, hi)]);
        assert!(point_in_polygon(Point::new(-5, 5), &tri));
        assert!(point_in_polygon(Point::new(7, 7), &tri));
        assert!(!point_in_polygon(Point::new(5, -5), &tri));
    }

    #[test]
    fn test_degenerate() {
        assert!(!point_in_polygon(Point::new(0, 0), &[]));
        let seg = pts(&[(0, 0), (4, 4)]);
        assert!(point_in_polygon(Point::new(2, 2), &seg));
        assert!(!point_in_polygon(Point::new(2, 3), &seg));
    }
}
