// ==========================================
// 症例記録インポート - 血液検査ドメインモデル
// ==========================================
// LabData は重複排除しない（取込のたびに新規作成）
// 数値 37 項目 + 判定文字列 10 項目
// ==========================================

use crate::domain::types::{FieldValue, ValueKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// LabData - 血液検査結果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabData {
    pub id: Uuid,
    pub patient_id: String,
    pub surgery_id: Option<Uuid>,
    pub test_date: Option<NaiveDate>,

    // ===== 血球系 =====
    pub wbc: Option<f64>,
    pub rbc: Option<f64>,
    pub hb: Option<f64>,
    pub hematocrit: Option<f64>,
    pub mcv: Option<f64>,
    pub mch: Option<f64>,
    pub mchc: Option<f64>,
    pub platelet: Option<f64>,

    // ===== 凝固系 =====
    pub pt_time: Option<f64>,
    pub pt_control: Option<f64>,
    pub pt_activity: Option<f64>,
    pub pt_inr: Option<f64>,
    pub prothrombin_time: Option<f64>,
    pub aptt: Option<f64>,

    // ===== 生化学 =====
    pub total_protein: Option<f64>,
    pub uric_acid: Option<f64>,
    pub un: Option<f64>,
    pub indirect_bilirubin: Option<f64>,
    pub creatinine: Option<f64>,
    pub sodium: Option<f64>,
    pub potassium: Option<f64>,
    pub chloride: Option<f64>,
    pub iron: Option<f64>,
    pub total_cholesterol: Option<f64>,
    pub triglyceride: Option<f64>,
    pub total_bilirubin: Option<f64>,
    pub direct_bilirubin: Option<f64>,
    pub ast: Option<f64>,
    pub alt: Option<f64>,
    pub gamma_gtp: Option<f64>,
    pub alp: Option<f64>,
    pub ldh: Option<f64>,

    // ===== 糖代謝 =====
    pub glucose: Option<f64>,
    pub fasting_blood_sugar: Option<f64>,
    pub hba1c: Option<f64>,

    // ===== 感染症（定量値）=====
    pub hbs_antigen_value: Option<f64>,
    pub hcv_antibody_index: Option<f64>,

    // ===== 判定（文字列）=====
    pub hbs_antigen_result: Option<String>,
    pub hbs_antibody_result: Option<String>,
    pub hbs_antibody_value: Option<String>, // 取込元が "<10" 等を返すため文字列
    pub blood_type_abo: Option<String>,
    pub blood_type_rh: Option<String>,
    pub rpr_result: Option<String>,
    pub syphilis_tp_result: Option<String>,
    pub hcv_antibody_result: Option<String>,
    pub hcv_antibody_unit: Option<String>,
    pub hiv_result: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl LabData {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.into(),
            surgery_id: None,
            test_date: None,
            wbc: None,
            rbc: None,
            hb: None,
            hematocrit: None,
            mcv: None,
            mch: None,
            mchc: None,
            platelet: None,
            pt_time: None,
            pt_control: None,
            pt_activity: None,
            pt_inr: None,
            prothrombin_time: None,
            aptt: None,
            total_protein: None,
            uric_acid: None,
            un: None,
            indirect_bilirubin: None,
            creatinine: None,
            sodium: None,
            potassium: None,
            chloride: None,
            iron: None,
            total_cholesterol: None,
            triglyceride: None,
            total_bilirubin: None,
            direct_bilirubin: None,
            ast: None,
            alt: None,
            gamma_gtp: None,
            alp: None,
            ldh: None,
            glucose: None,
            fasting_blood_sugar: None,
            hba1c: None,
            hbs_antigen_value: None,
            hcv_antibody_index: None,
            hbs_antigen_result: None,
            hbs_antibody_result: None,
            hbs_antibody_value: None,
            blood_type_abo: None,
            blood_type_rh: None,
            rpr_result: None,
            syphilis_tp_result: None,
            hcv_antibody_result: None,
            hcv_antibody_unit: None,
            hiv_result: None,
            created_at: Utc::now(),
        }
    }

    /// 値が入っている検査項目数
    pub fn filled_count(&self) -> usize {
        let mut scratch = self.clone();
        let mut count = 0;
        for field in LabField::ALL {
            if field.read(&mut scratch).is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn value(&self, field: LabField) -> Option<FieldValue> {
        field.read(&mut self.clone())
    }
}

// ==========================================
// LabField - 検査項目（正規フィールド）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabField {
    // ===== 数値 =====
    Wbc,
    Rbc,
    Hb,
    Hematocrit,
    Mcv,
    Mch,
    Mchc,
    Platelet,
    PtTime,
    PtControl,
    PtActivity,
    PtInr,
    ProthrombinTime,
    Aptt,
    TotalProtein,
    UricAcid,
    Un,
    IndirectBilirubin,
    Creatinine,
    Sodium,
    Potassium,
    Chloride,
    Iron,
    TotalCholesterol,
    Triglyceride,
    TotalBilirubin,
    DirectBilirubin,
    Ast,
    Alt,
    GammaGtp,
    Alp,
    Ldh,
    Glucose,
    FastingBloodSugar,
    Hba1c,
    HbsAntigenValue,
    HcvAntibodyIndex,

    // ===== 文字列 =====
    HbsAntigenResult,
    HbsAntibodyResult,
    HbsAntibodyValue,
    BloodTypeAbo,
    BloodTypeRh,
    RprResult,
    SyphilisTpResult,
    HcvAntibodyResult,
    HcvAntibodyUnit,
    HivResult,
}

impl LabField {
    pub const ALL: [LabField; 47] = [
        LabField::Wbc,
        LabField::Rbc,
        LabField::Hb,
        LabField::Hematocrit,
        LabField::Mcv,
        LabField::Mch,
        LabField::Mchc,
        LabField::Platelet,
        LabField::PtTime,
        LabField::PtControl,
        LabField::PtActivity,
        LabField::PtInr,
        LabField::ProthrombinTime,
        LabField::Aptt,
        LabField::TotalProtein,
        LabField::UricAcid,
        LabField::Un,
        LabField::IndirectBilirubin,
        LabField::Creatinine,
        LabField::Sodium,
        LabField::Potassium,
        LabField::Chloride,
        LabField::Iron,
        LabField::TotalCholesterol,
        LabField::Triglyceride,
        LabField::TotalBilirubin,
        LabField::DirectBilirubin,
        LabField::Ast,
        LabField::Alt,
        LabField::GammaGtp,
        LabField::Alp,
        LabField::Ldh,
        LabField::Glucose,
        LabField::FastingBloodSugar,
        LabField::Hba1c,
        LabField::HbsAntigenValue,
        LabField::HcvAntibodyIndex,
        LabField::HbsAntigenResult,
        LabField::HbsAntibodyResult,
        LabField::HbsAntibodyValue,
        LabField::BloodTypeAbo,
        LabField::BloodTypeRh,
        LabField::RprResult,
        LabField::SyphilisTpResult,
        LabField::HcvAntibodyResult,
        LabField::HcvAntibodyUnit,
        LabField::HivResult,
    ];

    pub fn kind(self) -> ValueKind {
        use LabField::*;
        match self {
            HbsAntigenResult | HbsAntibodyResult | HbsAntibodyValue | BloodTypeAbo
            | BloodTypeRh | RprResult | SyphilisTpResult | HcvAntibodyResult
            | HcvAntibodyUnit | HivResult => ValueKind::Text,
            _ => ValueKind::Numeric,
        }
    }

    /// 値を格納する。種別が合わない値は拒否して false
    pub fn apply(self, lab: &mut LabData, value: FieldValue) -> bool {
        match value {
            FieldValue::Number(number) => match self.numeric_slot(lab) {
                Some(slot) => {
                    *slot = Some(number);
                    true
                }
                None => false,
            },
            FieldValue::Text(text) => match self.text_slot(lab) {
                Some(slot) => {
                    *slot = Some(text);
                    true
                }
                None => false,
            },
        }
    }

    // スロットは &mut でしか引けないため、呼び出し側で複製を渡す
    fn read(self, lab: &mut LabData) -> Option<FieldValue> {
        if let Some(slot) = self.numeric_slot(lab) {
            return slot.map(FieldValue::Number);
        }
        self.text_slot(lab)
            .and_then(|slot| slot.clone())
            .map(FieldValue::Text)
    }

    fn numeric_slot(self, lab: &mut LabData) -> Option<&mut Option<f64>> {
        use LabField::*;
        let slot = match self {
            Wbc => &mut lab.wbc,
            Rbc => &mut lab.rbc,
            Hb => &mut lab.hb,
            Hematocrit => &mut lab.hematocrit,
            Mcv => &mut lab.mcv,
            Mch => &mut lab.mch,
            Mchc => &mut lab.mchc,
            Platelet => &mut lab.platelet,
            PtTime => &mut lab.pt_time,
            PtControl => &mut lab.pt_control,
            PtActivity => &mut lab.pt_activity,
            PtInr => &mut lab.pt_inr,
            ProthrombinTime => &mut lab.prothrombin_time,
            Aptt => &mut lab.aptt,
            TotalProtein => &mut lab.total_protein,
            UricAcid => &mut lab.uric_acid,
            Un => &mut lab.un,
            IndirectBilirubin => &mut lab.indirect_bilirubin,
            Creatinine => &mut lab.creatinine,
            Sodium => &mut lab.sodium,
            Potassium => &mut lab.potassium,
            Chloride => &mut lab.chloride,
            Iron => &mut lab.iron,
            TotalCholesterol => &mut lab.total_cholesterol,
            Triglyceride => &mut lab.triglyceride,
            TotalBilirubin => &mut lab.total_bilirubin,
            DirectBilirubin => &mut lab.direct_bilirubin,
            Ast => &mut lab.ast,
            Alt => &mut lab.alt,
            GammaGtp => &mut lab.gamma_gtp,
            Alp => &mut lab.alp,
            Ldh => &mut lab.ldh,
            Glucose => &mut lab.glucose,
            FastingBloodSugar => &mut lab.fasting_blood_sugar,
            Hba1c => &mut lab.hba1c,
            HbsAntigenValue => &mut lab.hbs_antigen_value,
            HcvAntibodyIndex => &mut lab.hcv_antibody_index,
            _ => return None,
        };
        Some(slot)
    }

    fn text_slot(self, lab: &mut LabData) -> Option<&mut Option<String>> {
        use LabField::*;
        let slot = match self {
            HbsAntigenResult => &mut lab.hbs_antigen_result,
            HbsAntibodyResult => &mut lab.hbs_antibody_result,
            HbsAntibodyValue => &mut lab.hbs_antibody_value,
            BloodTypeAbo => &mut lab.blood_type_abo,
            BloodTypeRh => &mut lab.blood_type_rh,
            RprResult => &mut lab.rpr_result,
            SyphilisTpResult => &mut lab.syphilis_tp_result,
            HcvAntibodyResult => &mut lab.hcv_antibody_result,
            HcvAntibodyUnit => &mut lab.hcv_antibody_unit,
            HivResult => &mut lab.hiv_result,
            _ => return None,
        };
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_counts_by_kind() {
        let numeric = LabField::ALL
            .iter()
            .filter(|f| f.kind() == ValueKind::Numeric)
            .count();
        let text = LabField::ALL
            .iter()
            .filter(|f| f.kind() == ValueKind::Text)
            .count();
        assert_eq!(numeric, 37);
        assert_eq!(text, 10);
    }

    #[test]
    fn test_every_field_has_slot_of_its_kind() {
        for field in LabField::ALL {
            let mut lab = LabData::new("P001");
            let value = match field.kind() {
                ValueKind::Numeric => FieldValue::Number(1.0),
                ValueKind::Text => FieldValue::Text("陰性".to_string()),
            };
            assert!(field.apply(&mut lab, value.clone()), "{:?}", field);
            assert_eq!(lab.value(field), Some(value));
            assert_eq!(lab.filled_count(), 1);
        }
    }

    #[test]
    fn test_apply_rejects_wrong_kind() {
        let mut lab = LabData::new("P001");
        assert!(!LabField::Wbc.apply(&mut lab, FieldValue::Text("高".to_string())));
        assert!(!LabField::HivResult.apply(&mut lab, FieldValue::Number(0.1)));
        assert_eq!(lab.filled_count(), 0);
    }
}
