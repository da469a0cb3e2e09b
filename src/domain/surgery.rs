// ==========================================
// 症例記録インポート - 手術ドメインモデル
// ==========================================
// 所有関係: Surgery は必ず 1 名の Patient に属する
// 取込時の照合キー: (patient_id, surgery_date)
// ==========================================

use crate::domain::types::{FieldValue, SurgeryCategory, ValueKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// SurgeryMeasurements - 術前計測・注入量
// ==========================================
// 左右は常に独立して保持する
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurgeryMeasurements {
    // ===== 体格 =====
    pub height_cm: Option<f64>,      // 身長（cm）
    pub body_weight_kg: Option<f64>, // 体重（kg）
    pub reported_bmi: Option<f64>,   // 取込元 BMI（身長・体重が揃う場合は保持しない）

    // ===== VECTRA 術前体積 =====
    pub pre_op_vectra_right: Option<f64>,
    pub pre_op_vectra_left: Option<f64>,

    // ===== 乳房計測 =====
    pub nac_imf_right: Option<f64>,
    pub nac_imf_stretch_right: Option<f64>,
    pub nac_imf_left: Option<f64>,
    pub nac_imf_stretch_left: Option<f64>,
    pub skin_thickness_right: Option<f64>,
    pub skin_thickness_left: Option<f64>,

    // ===== 脂肪注入量（cc）=====
    pub injection_volume_right: Option<f64>,
    pub injection_volume_left: Option<f64>,
    pub subcutaneous_right: Option<f64>,
    pub subglandular_right: Option<f64>,
    pub submuscular_right: Option<f64>,
    pub subcutaneous_left: Option<f64>,
    pub subglandular_left: Option<f64>,
    pub submuscular_left: Option<f64>,
    pub decollete_right: Option<f64>,
    pub decollete_left: Option<f64>,

    // ===== インプラント / 脂肪吸引 =====
    pub implant_size_right: Option<f64>,
    pub implant_size_left: Option<f64>,
    pub liposuction_volume: Option<f64>,
}

// ==========================================
// Surgery - 手術記録
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surgery {
    // ===== 識別 =====
    pub id: Uuid,
    pub patient_id: String,      // 所有患者の自然キー
    pub surgery_date: NaiveDate, // 手術日

    // ===== 術式 =====
    pub category: Option<SurgeryCategory>, // 手術カテゴリ
    pub surgery_type: Option<String>,      // 術式
    pub procedure: Option<String>,         // 術式詳細（例: "脂肪注入 (Condense)"）

    // ===== 術式固有情報 =====
    pub anesthesia_method: Option<String>,
    pub implant_manufacturer: Option<String>,
    pub implant_shape: Option<String>,
    pub insertion_plane: Option<String>,
    pub incision_site: Option<String>,
    pub donor_site: Option<String>,         // 採取部位
    pub liposuction_device: Option<String>,
    pub number_of_procedures: Option<u32>,  // 手術回数

    // ===== 既往 =====
    pub smoking_history: Option<String>,
    pub breastfeeding_history: Option<String>,

    pub measurements: SurgeryMeasurements,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Surgery {
    pub fn new(patient_id: impl Into<String>, surgery_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.into(),
            surgery_date,
            category: None,
            surgery_type: None,
            procedure: None,
            anesthesia_method: None,
            implant_manufacturer: None,
            implant_shape: None,
            insertion_plane: None,
            incision_site: None,
            donor_site: None,
            liposuction_device: None,
            number_of_procedures: None,
            smoking_history: None,
            breastfeeding_history: None,
            measurements: SurgeryMeasurements::default(),
            notes: None,
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// SurgeryField - 手術シートの取込先フィールド
// ==========================================
// 列 → フィールドの対応表はこの列挙で表現し、
// 値の格納は apply() の型付きセッターに限定する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurgeryField {
    // ===== 文字列 =====
    Category,
    SurgeryType,
    AnesthesiaMethod,
    ImplantManufacturer,
    ImplantShape,
    InsertionPlane,
    IncisionSite,
    DonorSite,
    LiposuctionDevice,
    SmokingHistory,
    BreastfeedingHistory,
    Notes,

    // ===== 数値 =====
    NumberOfProcedures,
    ReportedBmi,
    HeightCm,
    BodyWeightKg,
    PreOpVectraRight,
    PreOpVectraLeft,
    NacImfRight,
    NacImfStretchRight,
    NacImfLeft,
    NacImfStretchLeft,
    SkinThicknessRight,
    SkinThicknessLeft,
    InjectionVolumeRight,
    InjectionVolumeLeft,
    SubcutaneousRight,
    SubglandularRight,
    SubmuscularRight,
    SubcutaneousLeft,
    SubglandularLeft,
    SubmuscularLeft,
    DecolleteRight,
    DecolleteLeft,
    ImplantSizeRight,
    ImplantSizeLeft,
    LiposuctionVolume,
}

impl SurgeryField {
    pub fn kind(self) -> ValueKind {
        use SurgeryField::*;
        match self {
            Category | SurgeryType | AnesthesiaMethod | ImplantManufacturer | ImplantShape
            | InsertionPlane | IncisionSite | DonorSite | LiposuctionDevice | SmokingHistory
            | BreastfeedingHistory | Notes => ValueKind::Text,
            _ => ValueKind::Numeric,
        }
    }

    /// 診断メッセージ用の列名
    pub fn label(self) -> &'static str {
        use SurgeryField::*;
        match self {
            Category => "手術カテゴリ",
            SurgeryType => "術式",
            AnesthesiaMethod => "麻酔方法",
            ImplantManufacturer => "インプラントメーカー",
            ImplantShape => "インプラント形状",
            InsertionPlane => "挿入位置",
            IncisionSite => "切開位置",
            DonorSite => "採取部位",
            LiposuctionDevice => "吸引機器",
            SmokingHistory => "喫煙歴",
            BreastfeedingHistory => "授乳歴",
            Notes => "備考",
            NumberOfProcedures => "手術回数",
            ReportedBmi => "BMI",
            HeightCm => "身長",
            BodyWeightKg => "体重",
            PreOpVectraRight => "VECTRA術前(R)",
            PreOpVectraLeft => "VECTRA術前(L)",
            NacImfRight => "NAC-IMF(R)",
            NacImfStretchRight => "NAC-IMF on stretch(R)",
            NacImfLeft => "NAC-IMF(L)",
            NacImfStretchLeft => "NAC-IMF on stretch(L)",
            SkinThicknessRight => "skin thickness(R)",
            SkinThicknessLeft => "skin thickness(L)",
            InjectionVolumeRight => "Injection Volume(R)",
            InjectionVolumeLeft => "Injection Volume(L)",
            SubcutaneousRight => "皮下(R)",
            SubglandularRight => "乳腺下(R)",
            SubmuscularRight => "大胸筋下(R)",
            SubcutaneousLeft => "皮下(L)",
            SubglandularLeft => "乳腺下(L)",
            SubmuscularLeft => "大胸筋下(L)",
            DecolleteRight => "デコルテ(R)",
            DecolleteLeft => "デコルテ(L)",
            ImplantSizeRight => "インプラントサイズ(R)",
            ImplantSizeLeft => "インプラントサイズ(L)",
            LiposuctionVolume => "吸引量",
        }
    }

    /// 値を格納する。種別が合わない値は拒否して false
    pub fn apply(self, surgery: &mut Surgery, value: FieldValue) -> bool {
        match value {
            FieldValue::Text(text) => match self.text_slot(surgery) {
                Some(slot) => {
                    *slot = Some(text);
                    true
                }
                None if self == SurgeryField::Category => {
                    surgery.category = SurgeryCategory::from_label(&text);
                    true
                }
                None => false,
            },
            FieldValue::Number(number) => {
                if self == SurgeryField::NumberOfProcedures {
                    if number.fract() != 0.0 || number < 0.0 || number > u32::MAX as f64 {
                        return false;
                    }
                    surgery.number_of_procedures = Some(number as u32);
                    return true;
                }
                match self.numeric_slot(&mut surgery.measurements) {
                    Some(slot) => {
                        *slot = Some(number);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    fn text_slot(self, surgery: &mut Surgery) -> Option<&mut Option<String>> {
        use SurgeryField::*;
        let slot = match self {
            SurgeryType => &mut surgery.surgery_type,
            AnesthesiaMethod => &mut surgery.anesthesia_method,
            ImplantManufacturer => &mut surgery.implant_manufacturer,
            ImplantShape => &mut surgery.implant_shape,
            InsertionPlane => &mut surgery.insertion_plane,
            IncisionSite => &mut surgery.incision_site,
            DonorSite => &mut surgery.donor_site,
            LiposuctionDevice => &mut surgery.liposuction_device,
            SmokingHistory => &mut surgery.smoking_history,
            BreastfeedingHistory => &mut surgery.breastfeeding_history,
            Notes => &mut surgery.notes,
            _ => return None,
        };
        Some(slot)
    }

    fn numeric_slot(self, m: &mut SurgeryMeasurements) -> Option<&mut Option<f64>> {
        use SurgeryField::*;
        let slot = match self {
            ReportedBmi => &mut m.reported_bmi,
            HeightCm => &mut m.height_cm,
            BodyWeightKg => &mut m.body_weight_kg,
            PreOpVectraRight => &mut m.pre_op_vectra_right,
            PreOpVectraLeft => &mut m.pre_op_vectra_left,
            NacImfRight => &mut m.nac_imf_right,
            NacImfStretchRight => &mut m.nac_imf_stretch_right,
            NacImfLeft => &mut m.nac_imf_left,
            NacImfStretchLeft => &mut m.nac_imf_stretch_left,
            SkinThicknessRight => &mut m.skin_thickness_right,
            SkinThicknessLeft => &mut m.skin_thickness_left,
            InjectionVolumeRight => &mut m.injection_volume_right,
            InjectionVolumeLeft => &mut m.injection_volume_left,
            SubcutaneousRight => &mut m.subcutaneous_right,
            SubglandularRight => &mut m.subglandular_right,
            SubmuscularRight => &mut m.submuscular_right,
            SubcutaneousLeft => &mut m.subcutaneous_left,
            SubglandularLeft => &mut m.subglandular_left,
            SubmuscularLeft => &mut m.submuscular_left,
            DecolleteRight => &mut m.decollete_right,
            DecolleteLeft => &mut m.decollete_left,
            ImplantSizeRight => &mut m.implant_size_right,
            ImplantSizeLeft => &mut m.implant_size_left,
            LiposuctionVolume => &mut m.liposuction_volume,
            _ => return None,
        };
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Surgery {
        Surgery::new("P001", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    #[test]
    fn test_apply_text_and_numeric() {
        let mut surgery = sample();
        assert!(SurgeryField::DonorSite.apply(&mut surgery, FieldValue::Text("腹部".into())));
        assert!(SurgeryField::InjectionVolumeRight.apply(&mut surgery, FieldValue::Number(250.0)));

        assert_eq!(surgery.donor_site.as_deref(), Some("腹部"));
        assert_eq!(surgery.measurements.injection_volume_right, Some(250.0));
        assert_eq!(surgery.measurements.injection_volume_left, None);
    }

    #[test]
    fn test_apply_category_uses_label_parser() {
        let mut surgery = sample();
        assert!(SurgeryField::Category.apply(&mut surgery, FieldValue::Text("豊胸".into())));
        assert_eq!(surgery.category, Some(SurgeryCategory::BreastAugmentation));
    }

    #[test]
    fn test_apply_rejects_mismatched_kind() {
        let mut surgery = sample();
        assert!(!SurgeryField::HeightCm.apply(&mut surgery, FieldValue::Text("160".into())));
        assert!(!SurgeryField::Notes.apply(&mut surgery, FieldValue::Number(1.0)));
        assert_eq!(surgery.measurements.height_cm, None);
    }

    #[test]
    fn test_number_of_procedures_requires_integer() {
        let mut surgery = sample();
        assert!(!SurgeryField::NumberOfProcedures.apply(&mut surgery, FieldValue::Number(1.5)));
        assert!(SurgeryField::NumberOfProcedures.apply(&mut surgery, FieldValue::Number(2.0)));
        assert_eq!(surgery.number_of_procedures, Some(2));
    }

    #[test]
    fn test_kind_matches_slot() {
        assert_eq!(SurgeryField::Notes.kind(), ValueKind::Text);
        assert_eq!(SurgeryField::DecolleteLeft.kind(), ValueKind::Numeric);
    }
}
